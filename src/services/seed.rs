//! Startup seeding: bootstrap administrator and a sample catalog

use crate::{
    config::SeedConfig,
    error::AppResult,
    models::{copy::DonateBook, Condition, Principal},
    services::Services,
};

/// (title, author, category, description, isbn)
const SAMPLE_BOOKS: &[(&str, &str, &str, &str, &str)] = &[
    ("गीता रहस्य", "बाल गंगाधर तिलक", "धर्म", "भगवद्गीता की व्याख्या", "978-8171234567"),
    ("हरी घास के ये दिन", "फणीश्वरनाथ रेणु", "उपन्यास", "प्रसिद्ध हिंदी उपन्यास", "978-8171234568"),
    ("आपका बंटी", "मन्नू भंडारी", "उपन्यास", "बाल मनोविज्ञान पर आधारित उपन्यास", "978-8171234569"),
    ("चंद्रकांता", "देवकीनंदन खत्री", "तिलिस्मी", "प्रसिद्ध तिलिस्मी उपन्यास", "978-8171234570"),
    ("रामायण", "महर्षि वाल्मीकि", "धर्म", "महाकाव्य रामायण", "978-8171234571"),
];

/// Apply the configured seed. Returns the number of sample copies donated.
pub async fn run(services: &Services, config: &SeedConfig) -> AppResult<usize> {
    let (Some(username), Some(email), Some(password)) = (
        config.admin_username.as_deref(),
        config.admin_email.as_deref(),
        config.admin_password.as_deref(),
    ) else {
        tracing::debug!("No bootstrap administrator configured");
        return Ok(0);
    };

    let admin = services.users.ensure_admin(username, email, password).await?;

    if !config.sample_data {
        return Ok(0);
    }

    let (_, existing) = services.catalog.search(&Default::default()).await?;
    if existing > 0 {
        tracing::debug!(existing, "Catalog not empty, skipping sample data");
        return Ok(0);
    }

    let donor = Principal::from(&admin);
    for (title, author, category, description, isbn) in SAMPLE_BOOKS {
        services
            .donations
            .donate(
                &donor,
                DonateBook {
                    title: title.to_string(),
                    author: author.to_string(),
                    isbn: Some(isbn.to_string()),
                    category: Some(category.to_string()),
                    description: Some(description.to_string()),
                    image_url: None,
                    condition: Some(Condition::Good),
                    notes: Some(format!("Sample donation for {}", title)),
                },
            )
            .await?;
    }

    tracing::info!(count = SAMPLE_BOOKS.len(), "Sample catalog seeded");
    Ok(SAMPLE_BOOKS.len())
}
