//! Callbacks through which the services report to their owner.
//!
//! Every method has a no-op default so implementors only override what
//! they care about. Listeners run inside the service task; a slow
//! listener stalls that service.

use std::fmt;

use serde::Serialize;

use crate::hid::CaptureReport;
use crate::obex::FolderListingItem;
use crate::state::{ConnectionPhase, RemotePath};
use crate::stroke::PathSegment;

/// Outcome carried by every command completion.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultCode {
    Ok = 0,
    Fail = -1,
}

impl ResultCode {
    pub fn from_success(success: bool) -> Self {
        if success { Self::Ok } else { Self::Fail }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

pub trait StreamingListener: Send + 'static {
    fn on_state_change(&mut self, _previous: &ConnectionPhase, _current: &ConnectionPhase) {}

    fn on_capture_report(&mut self, _report: &CaptureReport) {}

    /// Segments completed by the latest sample.
    fn on_drawn_paths(&mut self, _paths: &[PathSegment]) {}

    /// The device's erase button was pressed; the page is blank again.
    fn on_erase(&mut self) {}

    /// The device stored the current page.
    fn on_save(&mut self) {}
}

pub trait FtpListener: Send + 'static {
    fn on_state_change(&mut self, _previous: &ConnectionPhase, _current: &ConnectionPhase) {}

    fn on_connect_complete(&mut self, _result: ResultCode) {}

    fn on_disconnect_complete(&mut self, _result: ResultCode) {}

    /// `items` is `None` on failure.
    fn on_folder_listing_complete(
        &mut self,
        _items: Option<Vec<FolderListingItem>>,
        _result: ResultCode,
    ) {
    }

    /// `path` is the new working folder, `None` on failure.
    fn on_change_folder_complete(&mut self, _path: Option<RemotePath>, _result: ResultCode) {}

    /// `name` is the deleted entry, `None` on failure.
    fn on_delete_complete(&mut self, _name: Option<String>, _result: ResultCode) {}

    /// `item` carries the fetched bytes in `data`, `None` on failure.
    fn on_get_file_complete(&mut self, _item: Option<FolderListingItem>, _result: ResultCode) {}
}

impl StreamingListener for () {}
impl FtpListener for () {}
