pub mod discord;
pub mod pager;
pub mod runner;
pub mod watermark;
pub mod youtube;
