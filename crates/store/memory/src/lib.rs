mod repository;

pub use repository::MemoryRepository;
