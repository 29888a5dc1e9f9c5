//! HTTP request handlers organized by functionality

pub mod convert;
pub mod proxy;
pub mod search;
pub mod session;
pub mod settings;
pub mod streaming;

pub use convert::{ConvertResponse, convert_torrent};
pub use proxy::{ProxyTestRequest, test_proxy};
pub use search::{SearchQuery, search_indexer, test_indexer};
pub use session::{
    CreateSessionRequest, CreateSessionResponse, create_session, delete_session, list_files,
    list_sessions,
};
pub use settings::{MessageResponse, get_settings, update_jackett, update_prowlarr, update_proxy};
pub use streaming::{StreamQuery, parse_file_index, stream_file};
