//! # wellness-search
//!
//! Agent search for a wellness content catalog (products, foods, remedies,
//! supplementation guides and wellness tips). A free-text query goes in; an
//! empathetic answer with quick tips, a summary and the matching catalog
//! records comes out.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────┐
//!        │  User Query   │
//!        └──────┬───────┘
//!               ▼
//!      ┌─────────────────┐
//!      │    Embedder      │  1536-d vector, no cache, no retry
//!      └────────┬────────┘
//!               ▼
//!      ┌─────────────────┐   reported error ─▶ unranked sample (0.8)
//!      │    Retriever     │   any failure   ─▶ emergency sample (0.7)
//!      │ similarity ≥ 0.5 │
//!      └────────┬────────┘
//!               │ 0 candidates ─▶ canned "no matches" answer
//!               ▼
//!      ┌─────────────────┐
//!      │    Enricher      │  per-type catalog lookup, failures dropped
//!      └────────┬────────┘
//!               ▼
//!      ┌─────────────────┐
//!      │    Composer      │  LLM JSON answer, fixed fallback
//!      └────────┬────────┘
//!               ▼
//!   { empathyMessage, quickTips, summary, searchResults }
//! ```
//!
//! Any failure that escapes the stages (in practice: embedding) becomes a
//! canned apology with status 500 and the same body shape.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the store, LLM and search tuning
//! - [`models`] - Content types, candidates, enriched results and the response body
//! - [`llm::embeddings`] - Query embedding via Ollama or OpenAI-compatible APIs
//! - [`llm::chat`] - Single-shot chat completion used for answer composition
//! - [`llm::compose`] - Prompt construction, strict JSON parsing and the fallback answer
//! - [`search::store`] - Embedding store and catalog traits, store error taxonomy
//! - [`search::supabase`] - PostgREST implementation of both traits
//! - [`search::vector`] - In-memory cosine store loaded from an embeddings export
//! - [`search::retriever`] - Ordered fallback chain of retrieval tiers
//! - [`search::enrich`] - Per-candidate detail resolution
//! - [`pipeline`] - Stage orchestration and canned responses
//! - [`api`] - Axum handlers for agent search and health
//! - [`state`] - Shared application state wiring the pipeline together

pub mod api;
pub mod config;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
