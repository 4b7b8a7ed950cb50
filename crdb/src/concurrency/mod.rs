pub mod ready;
pub mod stop;
