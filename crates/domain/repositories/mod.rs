pub mod booking_store;
pub mod notification_dispatcher;
pub mod payment_gateway;
pub mod video_provider;
