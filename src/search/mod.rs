pub mod enrich;
pub mod retriever;
pub mod store;
pub mod supabase;
pub mod vector;
