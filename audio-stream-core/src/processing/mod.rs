pub mod channel_areas;
pub mod ring_buffer;
pub mod sine;
