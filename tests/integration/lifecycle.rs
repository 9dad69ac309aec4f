//! Borrow/return lifecycle and copy ledger rules at the service level

use std::sync::Arc;

use tokio::sync::Barrier;

use pustakalay_server::{
    config::SeedConfig,
    models::{
        book::BookQuery,
        copy::UpdateDonation,
        user::{RegisterUser, UpdateProfile},
        Condition, LoanStatusFilter, Pagination, Role,
    },
    services::seed,
    AppError,
};

use crate::common::{
    admin, assert_availability_matches_open_loans, copy_available, donate, file_state,
    make_overdue, member, remove_database, test_state,
};

#[tokio::test]
async fn test_same_title_donated_twice_is_one_entry_with_two_copies() {
    let state = test_state().await;
    let asha = member(&state, "asha").await;
    let ravi = member(&state, "ravi").await;
    let meera = member(&state, "meera").await;

    let first = donate(&state, &asha, "Ramayana", "Valmiki").await;
    let second = donate(&state, &ravi, "Ramayana", "Valmiki").await;

    assert_eq!(first.book.id, second.book.id);
    assert_ne!(first.copy.id, second.copy.id);

    let details = state.services.catalog.get_details(first.book.id).await.unwrap();
    assert_eq!(details.summary.total_copies, 2);
    assert_eq!(details.summary.available_copies, 2);

    state.services.loans.borrow(&meera, first.book.id).await.unwrap();

    let details = state.services.catalog.get_details(first.book.id).await.unwrap();
    assert_eq!(details.summary.available_copies, 1);
    assert_eq!(details.available_copies_detail.len(), 1);
    assert_availability_matches_open_loans(&state).await;
}

#[tokio::test]
async fn test_earliest_donated_copy_is_lent_first() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;

    let first = donate(&state, &donor, "Godan", "Premchand").await;
    let second = donate(&state, &donor, "Godan", "Premchand").await;

    let loan = state.services.loans.borrow(&reader, first.book.id).await.unwrap();
    assert_eq!(loan.loan.copy_id, Some(first.copy.id));
    assert!(!copy_available(&state, first.copy.id).await);
    assert!(copy_available(&state, second.copy.id).await);
}

#[tokio::test]
async fn test_donate_borrow_return_round_trip() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;

    let donation = donate(&state, &donor, "Chandrakanta", "Devaki Nandan Khatri").await;
    assert!(donation.copy.is_available);
    assert_eq!(donation.copy.condition, Condition::Good);

    let loan = state.services.loans.borrow(&reader, donation.book.id).await.unwrap();
    assert!(!loan.loan.is_returned);
    assert_eq!((loan.loan.due_date - loan.loan.borrowed_at).num_days(), 14);
    assert!(!copy_available(&state, donation.copy.id).await);
    assert_availability_matches_open_loans(&state).await;

    let returned = state.services.loans.return_loan(&reader, loan.loan.id).await.unwrap();
    assert!(returned.loan.is_returned);
    assert!(returned.loan.returned_at.is_some());
    assert_eq!(returned.loan.due_date, loan.loan.due_date);
    assert!(copy_available(&state, donation.copy.id).await);
    assert_availability_matches_open_loans(&state).await;

    assert!(state.services.loans.borrowed(&reader).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overdue_loan_blocks_borrowing_anywhere() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;

    let gita = donate(&state, &donor, "Gita Rahasya", "Bal Gangadhar Tilak").await;
    let bunty = donate(&state, &donor, "Aapka Bunty", "Mannu Bhandari").await;

    let loan = state.services.loans.borrow(&reader, gita.book.id).await.unwrap();
    make_overdue(&state, loan.loan.id).await;

    let err = state.services.loans.borrow(&reader, bunty.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Ineligible(_)), "got {:?}", err);
    assert!(copy_available(&state, bunty.copy.id).await);
    assert_availability_matches_open_loans(&state).await;

    let open = state.services.loans.borrowed(&reader).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(open[0].is_overdue);

    state.services.loans.return_loan(&reader, loan.loan.id).await.unwrap();
    state.services.loans.borrow(&reader, bunty.book.id).await.unwrap();
}

#[tokio::test]
async fn test_one_open_loan_per_entry_even_with_spare_copies() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;

    let donation = donate(&state, &donor, "Maila Anchal", "Phanishwar Nath Renu").await;
    donate(&state, &donor, "Maila Anchal", "Phanishwar Nath Renu").await;

    state.services.loans.borrow(&reader, donation.book.id).await.unwrap();
    let err = state.services.loans.borrow(&reader, donation.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    let summary = state.services.repository.books.get_summary(donation.book.id).await.unwrap();
    assert_eq!(summary.available_copies, 1);
    assert_availability_matches_open_loans(&state).await;
}

#[tokio::test]
async fn test_borrow_reports_missing_entry_and_exhausted_copies() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let first = member(&state, "first").await;
    let second = member(&state, "second").await;

    let err = state.services.loans.borrow(&first, 999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);

    let donation = donate(&state, &donor, "Nirmala", "Premchand").await;
    state.services.loans.borrow(&first, donation.book.id).await.unwrap();

    let err = state.services.loans.borrow(&second, donation.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)), "got {:?}", err);
    assert_availability_matches_open_loans(&state).await;
}

#[tokio::test]
async fn test_return_rules() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;
    let stranger = member(&state, "stranger").await;
    let librarian = admin(&state, "librarian").await;

    let donation = donate(&state, &donor, "Gaban", "Premchand").await;
    let loan = state.services.loans.borrow(&reader, donation.book.id).await.unwrap();

    let err = state.services.loans.return_loan(&stranger, loan.loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)), "got {:?}", err);
    assert!(!copy_available(&state, donation.copy.id).await);

    let err = state.services.loans.force_return(&reader, loan.loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)), "got {:?}", err);

    let err = state.services.loans.return_loan(&reader, 4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);

    let closed = state.services.loans.force_return(&librarian, loan.loan.id).await.unwrap();
    assert!(closed.is_returned);
    assert!(copy_available(&state, donation.copy.id).await);

    let err = state.services.loans.return_loan(&reader, loan.loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned), "got {:?}", err);

    let err = state.services.loans.force_return(&librarian, loan.loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned), "got {:?}", err);

    // A stranger learns nothing about a closed loan either
    let err = state.services.loans.return_loan(&stranger, loan.loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)), "got {:?}", err);

    assert_availability_matches_open_loans(&state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_last_copy() {
    let (state, path) = file_state("last-copy", 8).await;
    let donor = member(&state, "donor").await;

    let donation = donate(&state, &donor, "Rangbhoomi", "Premchand").await;
    let book_id = donation.book.id;

    let mut borrowers = Vec::new();
    for i in 0..6 {
        borrowers.push(member(&state, &format!("reader{}", i)).await);
    }

    let barrier = Arc::new(Barrier::new(borrowers.len()));
    let handles: Vec<_> = borrowers
        .into_iter()
        .map(|user| {
            let services = state.services.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                services.loans.borrow(&user, book_id).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("borrow task panicked") {
            Ok(_) => successes += 1,
            Err(AppError::Unavailable(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(successes, 1);
    assert!(!copy_available(&state, donation.copy.id).await);
    assert_availability_matches_open_loans(&state).await;

    let open: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE is_returned = 0")
        .fetch_one(&state.services.repository.pool)
        .await
        .unwrap();
    assert_eq!(open, 1);

    state.services.repository.pool.close().await;
    remove_database(&path);
}

#[tokio::test]
async fn test_overdue_listing_excludes_returned_loans() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let late = member(&state, "late").await;
    let punctual = member(&state, "punctual").await;
    let librarian = admin(&state, "librarian").await;

    let first = donate(&state, &donor, "Kamayani", "Jaishankar Prasad").await;
    let second = donate(&state, &donor, "Madhushala", "Harivansh Rai Bachchan").await;

    let overdue = state.services.loans.borrow(&late, first.book.id).await.unwrap();
    make_overdue(&state, overdue.loan.id).await;

    let returned = state.services.loans.borrow(&punctual, second.book.id).await.unwrap();
    make_overdue(&state, returned.loan.id).await;
    state.services.loans.return_loan(&punctual, returned.loan.id).await.unwrap();

    let page = Pagination::new(None, None);
    let (loans, total) = state
        .services
        .loans
        .list(&librarian, LoanStatusFilter::Overdue, page)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(loans[0].loan.id, overdue.loan.id);
    assert!(loans[0].is_overdue);

    let (_, returned_total) = state
        .services
        .loans
        .list(&librarian, LoanStatusFilter::Returned, page)
        .await
        .unwrap();
    assert_eq!(returned_total, 1);

    let (_, all_total) = state
        .services
        .loans
        .list(&librarian, LoanStatusFilter::All, page)
        .await
        .unwrap();
    assert_eq!(all_total, 2);

    let err = state
        .services
        .loans
        .list(&late, LoanStatusFilter::All, page)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let stats = state.services.stats.dashboard(&librarian).await.unwrap();
    assert_eq!(stats.total_borrowings, 2);
    assert_eq!(stats.active_borrowings, 1);
    assert_eq!(stats.overdue_borrowings, 1);
    assert_eq!(stats.unavailable_copies, stats.active_borrowings);
}

#[tokio::test]
async fn test_copy_deletion_rules_and_loan_history() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;
    let librarian = admin(&state, "librarian").await;

    let donation = donate(&state, &donor, "Tamas", "Bhisham Sahni").await;
    let loan = state.services.loans.borrow(&reader, donation.book.id).await.unwrap();

    let err = state.services.donations.delete(&reader, donation.copy.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)), "got {:?}", err);

    let err = state.services.donations.delete(&donor, donation.copy.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    state.services.loans.return_loan(&reader, loan.loan.id).await.unwrap();
    state.services.donations.delete(&donor, donation.copy.id).await.unwrap();

    let err = state.services.donations.get(&librarian, donation.copy.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let history = state.services.repository.loans.get_by_id(loan.loan.id).await.unwrap();
    assert!(history.is_returned);
    assert_eq!(history.copy_id, None);
    assert_eq!(history.book_id, Some(donation.book.id));
}

#[tokio::test]
async fn test_book_deletion_blocked_by_open_loan() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;
    let librarian = admin(&state, "librarian").await;

    let donation = donate(&state, &donor, "Raag Darbari", "Shrilal Shukla").await;
    let loan = state.services.loans.borrow(&reader, donation.book.id).await.unwrap();

    let err = state.services.catalog.delete(&donor, donation.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = state.services.catalog.delete(&librarian, donation.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    state.services.loans.return_loan(&reader, loan.loan.id).await.unwrap();
    state.services.catalog.delete(&librarian, donation.book.id).await.unwrap();

    let err = state.services.catalog.get_details(donation.book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let history = state.services.repository.loans.get_by_id(loan.loan.id).await.unwrap();
    assert_eq!(history.book_id, None);
    assert_eq!(history.copy_id, None);

    let details = state
        .services
        .repository
        .loans
        .get_details(loan.loan.id, chrono::Utc::now())
        .await
        .unwrap();
    assert!(details.book.is_none());
}

#[tokio::test]
async fn test_donation_update_and_stats() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    let reader = member(&state, "reader").await;

    let donation = donate(&state, &donor, "Kafan", "Premchand").await;
    donate(&state, &donor, "Idgah", "Premchand").await;
    assert_eq!(donation.donation_ref, format!("DON{:06}", donation.copy.id));

    let err = state
        .services
        .donations
        .update(&reader, donation.copy.id, UpdateDonation::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let updated = state
        .services
        .donations
        .update(
            &donor,
            donation.copy.id,
            UpdateDonation {
                condition: Some(Condition::Fair),
                notes: Some("Cover torn".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.copy.condition, Condition::Fair);
    assert_eq!(updated.copy.notes.as_deref(), Some("Cover torn"));
    assert!(updated.copy.is_available);

    state.services.loans.borrow(&reader, donation.book.id).await.unwrap();

    let stats = state.services.donations.stats(&donor).await.unwrap();
    assert_eq!(stats.total_donated, 2);
    assert_eq!(stats.available_donated, 1);
    assert_eq!(stats.currently_borrowed, 1);

    let (mine, total) = state
        .services
        .donations
        .list_mine(&donor, Pagination::new(None, None))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(mine[0].book.title, "Idgah");
}

#[tokio::test]
async fn test_role_changes_apply_to_existing_tokens() {
    let state = test_state().await;
    let librarian = admin(&state, "librarian").await;
    let reader = member(&state, "reader").await;

    let user = state.services.users.get_by_id(reader.user_id).await.unwrap();
    let token = state.services.users.issue_token(&user).unwrap();
    assert_eq!(
        state.services.users.resolve_principal(&token).await.unwrap().role,
        Role::User
    );

    state
        .services
        .users
        .set_role(&librarian, reader.user_id, Role::Admin)
        .await
        .unwrap();
    let promoted = state.services.users.resolve_principal(&token).await.unwrap();
    assert!(promoted.is_admin());

    let err = state
        .services
        .users
        .set_role(&librarian, librarian.user_id, Role::User)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = state.services.users.resolve_principal("not-a-token").await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));
}

#[tokio::test]
async fn test_registration_normalizes_and_rejects_duplicates() {
    let state = test_state().await;
    member(&state, "asha").await;

    let (_, user) = state
        .services
        .users
        .register(RegisterUser {
            username: "  kabir ".to_string(),
            email: " Kabir@Example.COM ".to_string(),
            password: "secret123".to_string(),
            phone: Some("+919876543210".to_string()),
            address: None,
        })
        .await
        .unwrap();
    assert_eq!(user.username, "kabir");
    assert_eq!(user.email, "kabir@example.com");
    assert_eq!(user.role, Role::User);

    let (_, by_email) = state
        .services
        .users
        .login("KABIR@example.com", "secret123")
        .await
        .unwrap();
    assert_eq!(by_email.id, user.id);

    let err = state.services.users.login("kabir", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    let err = state
        .services
        .users
        .register(RegisterUser {
            username: "asha".to_string(),
            email: "other@example.com".to_string(),
            password: "secret123".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = state
        .services
        .users
        .register(RegisterUser {
            username: "short".to_string(),
            email: "short@example.com".to_string(),
            password: "123".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_seed_creates_admin_and_sample_catalog_once() {
    let state = test_state().await;
    let config = SeedConfig {
        admin_username: Some("admin".to_string()),
        admin_email: Some("admin@pustakalay.com".to_string()),
        admin_password: Some("admin123".to_string()),
        sample_data: true,
    };

    let seeded = seed::run(&state.services, &config).await.unwrap();
    assert_eq!(seeded, 5);

    let again = seed::run(&state.services, &config).await.unwrap();
    assert_eq!(again, 0);

    let (_, admin_user) = state.services.users.login("admin", "admin123").await.unwrap();
    assert_eq!(admin_user.role, Role::Admin);
    assert_eq!(state.services.repository.books.count().await.unwrap(), 5);
    assert_eq!(state.services.repository.copies.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_search_matches_non_ascii_capitals() {
    let state = test_state().await;
    let donor = member(&state, "donor").await;
    donate(&state, &donor, "Éloge de la fuite", "Henri Laborit").await;
    donate(&state, &donor, "Godan", "Premchand").await;

    for term in ["Éloge", "loge de", "LABORIT"] {
        let (books, total) = state
            .services
            .catalog
            .search(&BookQuery {
                search: Some(term.to_string()),
                ..BookQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1, "search for {:?}", term);
        assert_eq!(books[0].book.title, "Éloge de la fuite");
    }
}

#[tokio::test]
async fn test_email_login_is_not_shadowed_by_usernames() {
    let state = test_state().await;

    let err = state
        .services
        .users
        .register(RegisterUser {
            username: "kabir@example.com".to_string(),
            email: "squatter@example.com".to_string(),
            password: "secret123".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

    let kabir = member(&state, "kabir").await;
    let other = member(&state, "other").await;
    let err = state
        .services
        .users
        .update_profile(
            other.user_id,
            UpdateProfile {
                username: Some("kabir@example.com".to_string()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

    let (_, user) = state
        .services
        .users
        .login("kabir@example.com", "secret123")
        .await
        .unwrap();
    assert_eq!(user.id, kabir.user_id);
}
