//! # docchat
//!
//! A local-first retrieval-augmented chat core for private document
//! collections.
//!
//! docchat ingests documents (PDF, TXT, MD), splits them into overlapping
//! sentence-aware chunks, embeds and indexes them, and answers questions by
//! retrieving the most relevant chunks and handing a bounded prompt to a
//! generation backend. Embedding and generation are external capabilities
//! behind gateway traits; the default backends talk to a local Ollama
//! instance, so nothing has to leave the machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────────┐
//! │  Upload  │──▶│ Extract+Chunk │──▶│    SQLite     │
//! │ pdf/txt  │   │  + Embed      │   │ docs+vectors  │
//! └──────────┘   └───────────────┘   └──────┬────────┘
//!                                           │
//! ┌──────────┐   ┌───────────────┐   ┌──────▼────────┐
//! │  Answer  │◀──│ Prompt + LLM  │◀──│   Retrieve    │
//! │ +sources │   │  (gateway)    │   │  (cosine k-NN)│
//! └──────────┘   └───────────────┘   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Sentence-aware overlapping chunker |
//! | [`extract`] | Upload validation and text extraction |
//! | [`index`] | Durable cosine-similarity vector index |
//! | [`catalog`] | In-memory document registry |
//! | [`embedding`] | Embedding gateway abstraction |
//! | [`generation`] | Generation gateway abstraction |
//! | [`retrieve`] | Query-time retrieval |
//! | [`prompt`] | Prompt assembly with bounded history |
//! | [`service`] | End-to-end orchestration |

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod service;
