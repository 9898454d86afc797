//! wavesift-pl library interface
//!
//! Playlist building over the persisted analysis tables: descriptor
//! filtering/ranking, nearest-neighbor similarity over track embeddings, and
//! playlist file output.

pub mod playlist;
pub mod queries;
pub mod similar;
