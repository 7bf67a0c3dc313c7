//! Client subset of OBEX used for browsing and fetching stored pages.
//!
//! Only the folder-browsing (FTP) profile is covered: connect, set path,
//! listing and file GET, delete by PUT, disconnect.

pub mod header;
pub mod listing;
pub mod request;
pub mod response;

pub use header::{HeaderId, ObexHeader};
pub use listing::{FolderListingItem, parse_folder_listing};
pub use request::{
    ConnectParams, FOLDER_LISTING_TYPE, FTP_TARGET_UUID, MAX_PACKET_SIZE, OBEX_VERSION,
    ObexRequest, Opcode, SetPathFlags, SetPathParams,
};
pub use response::{ObexResponse, ResponseCode};
