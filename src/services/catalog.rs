//! Catalog service for book metadata

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{non_blank, Book, BookDetails, BookMetadata, BookQuery, BookSummary, CreateBook, UpdateBook},
        Pagination, Principal,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search the catalog
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<BookSummary>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        self.repository.books.search(query, pagination).await
    }

    /// Distinct categories in use
    pub async fn categories(&self) -> AppResult<Vec<String>> {
        self.repository.books.categories().await
    }

    /// Catalog entry with counts and the copies that can be borrowed now
    pub async fn get_details(&self, id: i64) -> AppResult<BookDetails> {
        let summary = self.repository.books.get_summary(id).await?;
        let available_copies_detail = self.repository.copies.list_available(id).await?;
        Ok(BookDetails {
            summary,
            available_copies_detail,
        })
    }

    /// Create a catalog entry (admin)
    pub async fn create(&self, actor: &Principal, data: CreateBook) -> AppResult<Book> {
        actor.require_admin()?;
        data.validate()?;

        let metadata = BookMetadata::from(data);
        require_title_and_author(&metadata.title, &metadata.author)?;

        let book = self.repository.books.create(&metadata).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    /// Update a catalog entry (admin)
    pub async fn update(&self, actor: &Principal, id: i64, mut data: UpdateBook) -> AppResult<Book> {
        actor.require_admin()?;

        data.title = data.title.map(|t| t.trim().to_string());
        data.author = data.author.map(|a| a.trim().to_string());
        data.isbn = non_blank(data.isbn);
        data.validate()?;

        let book = self.repository.books.update(id, &data).await?;
        tracing::info!(book_id = id, "Book updated");
        Ok(book)
    }

    /// Delete a catalog entry and its copies (admin)
    pub async fn delete(&self, actor: &Principal, id: i64) -> AppResult<()> {
        actor.require_admin()?;
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, actor_id = actor.user_id, "Book deleted");
        Ok(())
    }
}

/// Title and author must be non-blank after trimming
pub fn require_title_and_author(title: &str, author: &str) -> AppResult<()> {
    if title.trim().is_empty() || author.trim().is_empty() {
        return Err(AppError::Validation("Title and author are required".to_string()));
    }
    Ok(())
}
