pub mod app_users;
pub mod attendance_records;
pub mod availabilities;
pub mod booking_requests;
pub mod instructor_profiles;
pub mod live_sessions;
pub mod payouts;
pub mod session_offerings;
pub mod session_participants;
pub mod time_slots;
