pub mod buffer_provider;
pub mod mixer;
pub mod modem_link;
pub mod pcm;
