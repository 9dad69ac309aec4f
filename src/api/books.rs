//! Catalog and lending endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookDetails, BookQuery, BookSummary, CreateBook, UpdateBook},
        loan::LoanDetails,
        Pagination,
    },
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, MessageResponse, Page};

/// List catalog entries with search, filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Catalog page", body = Page<BookSummary>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    WithRejection(Query(query), _): ApiQuery<BookQuery>,
) -> AppResult<Json<ApiResponse<Page<BookSummary>>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (books, total) = state.services.catalog.search(&query).await?;
    Ok(Json(ApiResponse::ok(Page::new(books, total, pagination))))
}

/// Distinct categories in the catalog
#[utoipa::path(
    get,
    path = "/books/categories",
    tag = "books",
    responses(
        (status = 200, description = "Sorted category names", body = Vec<String>)
    )
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let categories = state.services.catalog.categories().await?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// Catalog entry with its available copies
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i64, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<BookDetails>>> {
    let book = state.services.catalog.get_details(id).await?;
    Ok(Json(ApiResponse::ok(book)))
}

/// Create a catalog entry (admin)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Json(data), _): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<ApiResponse<Book>>)> {
    let book = state.services.catalog.create(&principal, data).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Book created successfully", book)),
    ))
}

/// Update a catalog entry (admin)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
    WithRejection(Json(data), _): ApiJson<UpdateBook>,
) -> AppResult<Json<ApiResponse<Book>>> {
    let book = state.services.catalog.update(&principal, id, data).await?;
    Ok(Json(ApiResponse::with_message("Book updated successfully", book)))
}

/// Delete a catalog entry and its copies (admin)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has active borrowings", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.services.catalog.delete(&principal, id).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}

/// Borrow an available copy of a catalog entry
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Book ID")),
    responses(
        (status = 201, description = "Book borrowed", body = LoanDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already borrowed or no copy available", body = crate::error::ErrorResponse),
        (status = 422, description = "Borrower has overdue loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<ApiResponse<LoanDetails>>)> {
    let loan = state.services.loans.borrow(&principal, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Book borrowed successfully", loan)),
    ))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/books/return/{loan_id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("loan_id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 403, description = "Not the borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    WithRejection(Path(loan_id), _): ApiPath<i64>,
) -> AppResult<Json<ApiResponse<LoanDetails>>> {
    let loan = state.services.loans.return_loan(&principal, loan_id).await?;
    Ok(Json(ApiResponse::with_message("Book returned successfully", loan)))
}

/// The caller's open loans
#[utoipa::path(
    get,
    path = "/books/borrowed",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanDetails>)
    )
)]
pub async fn borrowed_books(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<LoanDetails>>>> {
    let loans = state.services.loans.borrowed(&principal).await?;
    Ok(Json(ApiResponse::ok(loans)))
}
