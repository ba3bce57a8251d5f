pub mod db;
pub mod file_store;
pub mod http;

pub use db::DbAdapter;
pub use file_store::FileStore;
pub use http::HttpChatAdapter;
