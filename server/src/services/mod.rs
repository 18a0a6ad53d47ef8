pub mod board_poller;
pub mod sheet_fetcher;
