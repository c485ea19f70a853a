//! Shared primitives for the actor kernel crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an actor task. Monotonically generated by the keyed
/// service, never reused within a process lifetime.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct TaskId(pub u64);

impl TaskId {
    pub const NULL: TaskId = TaskId(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle addressing a tab. Resolution happens through the tab provider and
/// may fail at any time once the tab is gone.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct TabHandle(pub i32);

impl TabHandle {
    pub const NULL: TabHandle = TabHandle(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn raw_value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle addressing a browser window, used only by window-scoped actions.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct WindowHandle(pub i32);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn raw_value(self) -> i32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Where on a page an action is aimed: a viewport coordinate or a node
/// previously reported in an observation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTarget {
    Coordinate(Point),
    DomNode {
        node_id: i32,
        document_identifier: String,
    },
}

impl PageTarget {
    pub fn is_coordinate(&self) -> bool {
        matches!(self, PageTarget::Coordinate(_))
    }
}

/// Result code for a single action or a whole action sequence. `Ok` is the
/// only success value; every other code names a distinct failure kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultCode {
    Ok,
    /// Sequence-level failure not attributable to a specific phase.
    Error,
    TaskWentAway,
    TaskPaused,
    EmptyActionSequence,
    TabWentAway,
    FrameWentAway,
    CrossOriginNavigation,
    UrlBlocked,
    FrameLocationChangedSinceObservation,
    ObservedTargetElementChanged,
    TriggeredNavigationBlocked,
    ArgumentsInvalid,
}

impl ActionResultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionResultCode::Ok => "Ok",
            ActionResultCode::Error => "Error",
            ActionResultCode::TaskWentAway => "TaskWentAway",
            ActionResultCode::TaskPaused => "TaskPaused",
            ActionResultCode::EmptyActionSequence => "EmptyActionSequence",
            ActionResultCode::TabWentAway => "TabWentAway",
            ActionResultCode::FrameWentAway => "FrameWentAway",
            ActionResultCode::CrossOriginNavigation => "CrossOriginNavigation",
            ActionResultCode::UrlBlocked => "UrlBlocked",
            ActionResultCode::FrameLocationChangedSinceObservation => {
                "FrameLocationChangedSinceObservation"
            }
            ActionResultCode::ObservedTargetElementChanged => "ObservedTargetElementChanged",
            ActionResultCode::TriggeredNavigationBlocked => "TriggeredNavigationBlocked",
            ActionResultCode::ArgumentsInvalid => "ArgumentsInvalid",
        }
    }
}

impl fmt::Display for ActionResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one action phase, one tool invocation, or one full sequence.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub code: ActionResultCode,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            code: ActionResultCode::Ok,
            message: None,
        }
    }

    pub fn error(code: ActionResultCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn error_msg(code: ActionResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ActionResultCode::Ok
    }

    pub fn to_debug_string(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {}", self.code, message),
            None => self.code.to_string(),
        }
    }
}

/// Which log stream a journal entry belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JournalTrack {
    Actor,
    Ui,
}

impl fmt::Display for JournalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalTrack::Actor => f.write_str("actor"),
            JournalTrack::Ui => f.write_str("ui"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_ids_are_null() {
        assert!(TaskId::NULL.is_null());
        assert!(!TaskId(7).is_null());
        assert!(TabHandle::NULL.is_null());
        assert!(!TabHandle(3).is_null());
    }

    #[test]
    fn rect_contains_is_half_open() {
        let rect = Rect::new(10, 10, 20, 20);
        assert!(rect.contains(Point::new(10, 10)));
        assert!(rect.contains(Point::new(29, 29)));
        assert!(!rect.contains(Point::new(30, 30)));
        assert!(!rect.contains(Point::new(9, 15)));
    }

    #[test]
    fn result_debug_string_includes_message() {
        let result = ActionResult::error_msg(ActionResultCode::UrlBlocked, "blocked host");
        assert!(!result.is_ok());
        assert_eq!(result.to_debug_string(), "UrlBlocked: blocked host");
        assert_eq!(ActionResult::ok().to_debug_string(), "Ok");
    }
}
