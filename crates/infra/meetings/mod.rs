pub mod video_room_client;
