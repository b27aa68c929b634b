pub mod auto_record;
pub mod buffer_pool;
pub mod level_meter;
pub mod wav_format;
