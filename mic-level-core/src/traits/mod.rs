pub mod engine_delegate;
pub mod input_device;
