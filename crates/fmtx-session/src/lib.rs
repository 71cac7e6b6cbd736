pub mod connection;
pub mod controller;
pub mod doze;
pub mod events;
pub mod scroller;
pub mod search;
pub mod service;
pub mod sim;
