mod api_key;
mod page_context;
mod pipeline;
mod popup_feed;
