//! Immutable descriptions of the actions a task can perform.
//!
//! One request describes one action: which tab (or window) it addresses,
//! where on the page it aims, and its kind-specific parameters. The engine
//! never mutates a request; tools clone what they need from it.

use actor_core_types::{PageTarget, TabHandle, WindowHandle};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    #[default]
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickCount {
    #[default]
    Single,
    Double,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMode {
    #[default]
    Replace,
    Prepend,
    Append,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDirection {
    Back,
    Forward,
}

/// Fields shared by every request aimed at a location inside a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageToolFields {
    pub tab: TabHandle,
    pub target: PageTarget,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickRequest {
    #[serde(flatten)]
    pub page: PageToolFields,
    pub click_type: ClickType,
    pub count: ClickCount,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeRequest {
    #[serde(flatten)]
    pub page: PageToolFields,
    pub text: String,
    pub follow_by_enter: bool,
    pub mode: TypeMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollRequest {
    #[serde(flatten)]
    pub page: PageToolFields,
    pub direction: ScrollDirection,
    pub distance: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveMouseRequest {
    #[serde(flatten)]
    pub page: PageToolFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragAndReleaseRequest {
    pub tab: TabHandle,
    pub from: PageTarget,
    pub to: PageTarget,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectRequest {
    #[serde(flatten)]
    pub page: PageToolFields,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub tab: TabHandle,
    pub url: Url,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub tab: TabHandle,
    pub direction: HistoryDirection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitRequest {
    pub tab: TabHandle,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivateTabRequest {
    pub tab: TabHandle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloseTabRequest {
    pub tab: TabHandle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateTabRequest {
    pub window: WindowHandle,
    pub foreground: bool,
}

/// One action of a sequence. Closed set: dispatch is an exhaustive match,
/// never a downcast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolRequest {
    Click(ClickRequest),
    Type(TypeRequest),
    Scroll(ScrollRequest),
    MoveMouse(MoveMouseRequest),
    DragAndRelease(DragAndReleaseRequest),
    Select(SelectRequest),
    Navigate(NavigateRequest),
    History(HistoryRequest),
    Wait(WaitRequest),
    ActivateTab(ActivateTabRequest),
    CloseTab(CloseTabRequest),
    CreateTab(CreateTabRequest),
}

impl ToolRequest {
    /// Tab this action addresses; null for window-scoped actions.
    pub fn tab_handle(&self) -> TabHandle {
        match self {
            ToolRequest::Click(r) => r.page.tab,
            ToolRequest::Type(r) => r.page.tab,
            ToolRequest::Scroll(r) => r.page.tab,
            ToolRequest::MoveMouse(r) => r.page.tab,
            ToolRequest::DragAndRelease(r) => r.tab,
            ToolRequest::Select(r) => r.page.tab,
            ToolRequest::Navigate(r) => r.tab,
            ToolRequest::History(r) => r.tab,
            ToolRequest::Wait(r) => r.tab,
            ToolRequest::ActivateTab(r) => r.tab,
            ToolRequest::CloseTab(r) => r.tab,
            ToolRequest::CreateTab(_) => TabHandle::NULL,
        }
    }

    /// Whether the per-action tab safety checks apply.
    pub fn is_tab_scoped(&self) -> bool {
        !matches!(self, ToolRequest::CreateTab(_))
    }

    /// Page location the action aims at, when it has one. Drag actions are
    /// addressed by their grab point.
    pub fn page_target(&self) -> Option<&PageTarget> {
        match self {
            ToolRequest::Click(r) => Some(&r.page.target),
            ToolRequest::Type(r) => Some(&r.page.target),
            ToolRequest::Scroll(r) => Some(&r.page.target),
            ToolRequest::MoveMouse(r) => Some(&r.page.target),
            ToolRequest::DragAndRelease(r) => Some(&r.from),
            ToolRequest::Select(r) => Some(&r.page.target),
            _ => None,
        }
    }

    /// URL worth attaching to journal entries for this action before a live
    /// frame is known.
    pub fn url_for_journal(&self) -> Option<Url> {
        match self {
            ToolRequest::Navigate(r) => Some(r.url.clone()),
            _ => None,
        }
    }

    pub fn journal_event(&self) -> &'static str {
        match self {
            ToolRequest::Click(_) => "Click",
            ToolRequest::Type(_) => "Type",
            ToolRequest::Scroll(_) => "Scroll",
            ToolRequest::MoveMouse(_) => "MoveMouse",
            ToolRequest::DragAndRelease(_) => "DragAndRelease",
            ToolRequest::Select(_) => "Select",
            ToolRequest::Navigate(_) => "Navigate",
            ToolRequest::History(_) => "History",
            ToolRequest::Wait(_) => "Wait",
            ToolRequest::ActivateTab(_) => "ActivateTab",
            ToolRequest::CloseTab(_) => "CloseTab",
            ToolRequest::CreateTab(_) => "CreateTab",
        }
    }

    /// Renderer-side payload for page actions; `None` for actions handled
    /// entirely in the browser process.
    pub fn to_tool_action(&self) -> Option<ToolAction> {
        match self {
            ToolRequest::Click(r) => Some(ToolAction::Click {
                click_type: r.click_type,
                count: r.count,
            }),
            ToolRequest::Type(r) => Some(ToolAction::Type {
                text: r.text.clone(),
                follow_by_enter: r.follow_by_enter,
                mode: r.mode,
            }),
            ToolRequest::Scroll(r) => Some(ToolAction::Scroll {
                direction: r.direction,
                distance: r.distance,
            }),
            ToolRequest::MoveMouse(_) => Some(ToolAction::MoveMouse),
            ToolRequest::DragAndRelease(r) => Some(ToolAction::DragAndRelease {
                to: r.to.clone(),
            }),
            ToolRequest::Select(r) => Some(ToolAction::Select {
                value: r.value.clone(),
            }),
            _ => None,
        }
    }
}

/// Kind-specific payload forwarded to the renderer for page actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToolAction {
    Click {
        click_type: ClickType,
        count: ClickCount,
    },
    Type {
        text: String,
        follow_by_enter: bool,
        mode: TypeMode,
    },
    Scroll {
        direction: ScrollDirection,
        distance: f32,
    },
    MoveMouse,
    DragAndRelease {
        to: PageTarget,
    },
    Select {
        value: String,
    },
}
