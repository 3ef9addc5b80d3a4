pub mod events {
    pub mod pony_jumped;
}
