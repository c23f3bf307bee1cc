pub mod rss_feed;
