pub mod direct_downloader;
pub mod http_client;
pub mod mime;
pub mod poller;
pub mod registry;
pub mod timed_text;
pub mod url_parser;
