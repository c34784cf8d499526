mod fetcher;
mod item;

pub use fetcher::FeedFetcher;
pub use item::RawItem;
