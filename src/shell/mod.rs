// Composition root for the stream store.
//
// Responsibilities
// - Read config from environment.
// - Instantiate the backend and wire it into a stream store (see main.rs).

pub mod config;
