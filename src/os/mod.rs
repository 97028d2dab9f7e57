// src/os/mod.rs

pub mod epoll;
