//! PostgreSQL store.
//!
//! Every listing-returning query selects through [`LISTING_SUMMARY_SELECT`],
//! so rating aggregates are computed by one SQL fragment. Booking writes lock
//! the listing row (`SELECT ... FOR UPDATE`) before reading the day's
//! bookings, which serializes all writers of a listing between the conflict
//! check and the insert.

use async_trait::async_trait;
use sqlx::{
    PgExecutor, PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions, types::Json,
};
use time::Date;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingMessage, BookingRole, BookingStatus, Listing, ListingFilter, ListingOrder,
    ListingPatch, ListingQuery, ListingStatus, ListingSummary, NewBooking, NewListing,
    NewReview, NewUser, Page, PageRequest, ProfilePatch, RatingStats, Review, User,
};
use crate::services::availability::{TimeSlot, find_conflict};

const USER_COLUMNS: &str =
    "id, username, email, role, major, grad_year, created_at, updated_at";

const LISTING_COLUMNS: &str = "id, owner_id, title, description, category, hourly_rate, \
     location, is_emergency, status, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, listing_id, customer_id, provider_id, booking_date, \
     start_time, duration_hours, status, total_price, messages, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, listing_id, customer_id, provider_id, rating, comment, \
     provider_response, created_at";

/// Listing columns plus rating aggregates. A listing without reviews gets
/// `average_rating = 0` and `reviews_count = 0`.
const LISTING_SUMMARY_SELECT: &str = r#"
    SELECT l.id, l.owner_id, l.title, l.description, l.category, l.hourly_rate,
           l.location, l.is_emergency, l.status, l.created_at, l.updated_at,
           COALESCE(r.average_rating, 0) AS average_rating,
           r.reviews_count
    FROM listings l
    LEFT JOIN LATERAL (
        SELECT AVG(rating)::DOUBLE PRECISION AS average_rating,
               COUNT(*) AS reviews_count
        FROM reviews
        WHERE reviews.listing_id = l.id
    ) r ON TRUE
"#;

const LISTING_DOCUMENT: &str = "to_tsvector('english', l.title || ' ' || l.description)";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to `database_url` and applies pending migrations.
    #[instrument(skip_all, fields(max_connections = max_connections))]
    pub async fn open(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        info!("Postgres store ready");

        Ok(Self { pool })
    }

    /// Wraps an existing pool whose schema is already migrated.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[inline]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn active_bookings_with<'e, E>(
        executor: E,
        listing_id: Uuid,
        date: Date,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Booking>>
    where
        E: PgExecutor<'e>,
    {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE listing_id = $1
              AND booking_date = $2
              AND status IN ('pending', 'confirmed')
              AND ($3::UUID IS NULL OR id <> $3)
            "#
        ))
        .bind(listing_id)
        .bind(date)
        .bind(exclude)
        .fetch_all(executor)
        .await?;

        Ok(bookings)
    }

    async fn paged_reviews(
        &self,
        column: &'static str,
        owner: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>> {
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reviews WHERE {column} = $1"))
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews
            WHERE {column} = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

/// Translates unique violations into domain errors by constraint name.
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
    {
        match db_err.constraint() {
            Some("users_email_key") => return AppError::DuplicateKey("email"),
            Some("users_username_key") => return AppError::DuplicateKey("username"),
            Some("reviews_customer_listing_key") => {
                return AppError::conflict("listing already reviewed by this customer");
            }
            other => warn!(constraint = ?other, "Unmapped unique violation"),
        }
    }
    AppError::Db(e)
}

/// `WHERE` clause of the shared listing filter.
fn push_listing_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ListingFilter) {
    qb.push(" WHERE l.status = 'active' AND l.hourly_rate >= ")
        .push_bind(filter.price_min)
        .push(" AND l.hourly_rate <= ")
        .push_bind(filter.price_max);

    if let Some(category) = &filter.category {
        qb.push(" AND l.category = ").push_bind(category.clone());
    }
    if let Some(location) = &filter.location {
        qb.push(" AND l.location = ").push_bind(location.clone());
    }
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND l.owner_id = ").push_bind(owner_id);
    }
    if let Some(text) = &filter.text {
        qb.push(" AND ").push(LISTING_DOCUMENT).push(" @@ ");
        push_any_term_query(qb, text);
    }
}

/// `plainto_tsquery` joins terms with AND; any term matching is enough here.
fn push_any_term_query(qb: &mut QueryBuilder<'_, Postgres>, text: &str) {
    qb.push("replace(plainto_tsquery('english', ")
        .push_bind(text.to_string())
        .push(")::TEXT, '&', '|')::TSQUERY");
}

fn push_listing_order(qb: &mut QueryBuilder<'_, Postgres>, query: &ListingQuery) {
    match (query.order, &query.filter.text) {
        (ListingOrder::Relevance, Some(text)) => {
            qb.push(" ORDER BY ts_rank(").push(LISTING_DOCUMENT).push(", ");
            push_any_term_query(qb, text);
            qb.push(") DESC, l.created_at DESC");
        }
        (ListingOrder::Relevance, None) | (ListingOrder::Newest, _) => {
            qb.push(" ORDER BY l.created_at DESC, l.updated_at DESC");
        }
        (ListingOrder::RecentlyUpdated, _) => {
            qb.push(" ORDER BY l.updated_at DESC, l.created_at DESC");
        }
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip_all)]
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, role, major, grad_year)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(&user.major)
        .bind(user.grad_year)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                major = COALESCE($3, major),
                grad_year = COALESCE($4, grad_year),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.username.as_deref())
        .bind(patch.major.as_deref())
        .bind(patch.grad_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    #[instrument(skip_all, fields(owner_id = %listing.owner_id))]
    async fn insert_listing(&self, listing: NewListing) -> AppResult<Listing> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings (id, owner_id, title, description, category, hourly_rate,
                                  location, is_emergency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(listing.owner_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.category)
        .bind(listing.hourly_rate)
        .bind(&listing.location)
        .bind(listing.is_emergency)
        .fetch_one(&self.pool)
        .await?;
        Ok(listing)
    }

    async fn listing_by_id(&self, id: Uuid) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    async fn listing_summary(&self, id: Uuid) -> AppResult<Option<ListingSummary>> {
        let mut qb = QueryBuilder::<Postgres>::new(LISTING_SUMMARY_SELECT);
        qb.push(" WHERE l.status = 'active' AND l.id = ")
            .push_bind(id);

        let summary = qb
            .build_query_as::<ListingSummary>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(summary)
    }

    async fn update_listing(&self, id: Uuid, patch: &ListingPatch) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                hourly_rate = COALESCE($5, hourly_rate),
                location = COALESCE($6, location),
                is_emergency = COALESCE($7, is_emergency),
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.category.as_deref())
        .bind(patch.hourly_rate)
        .bind(patch.location.as_deref())
        .bind(patch.is_emergency)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
    ) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    #[instrument(skip_all, fields(order = ?query.order, page = query.page.page))]
    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Page<ListingSummary>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM listings l");
        push_listing_filter(&mut count_qb, &query.filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(LISTING_SUMMARY_SELECT);
        push_listing_filter(&mut qb, &query.filter);
        push_listing_order(&mut qb, query);
        qb.push(" LIMIT ")
            .push_bind(query.page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);

        let items = qb
            .build_query_as::<ListingSummary>()
            .fetch_all(&self.pool)
            .await?;

        debug!(total, returned = items.len(), "Listing query evaluated");
        Ok(Page {
            items,
            total: total as u64,
            page: query.page.page,
            page_size: query.page.page_size,
        })
    }

    async fn active_bookings_on(
        &self,
        listing_id: Uuid,
        date: Date,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Booking>> {
        Self::active_bookings_with(&self.pool, listing_id, date, exclude).await
    }

    #[instrument(skip_all, fields(listing_id = %booking.listing_id))]
    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM listings WHERE id = $1 AND status = 'active' FOR UPDATE",
        )
        .bind(booking.listing_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("listing"));
        }

        let existing =
            Self::active_bookings_with(&mut *tx, booking.listing_id, booking.slot.date, None)
                .await?;
        if let Some(conflict) = find_conflict(&booking.slot, &existing, None) {
            return Err(AppError::booking_conflict(conflict.clone()));
        }

        let inserted = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (id, listing_id, customer_id, provider_id, booking_date,
                                  start_time, duration_hours, total_price, messages)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(booking.listing_id)
        .bind(booking.customer_id)
        .bind(booking.provider_id)
        .bind(booking.slot.date)
        .bind(booking.slot.start)
        .bind(booking.slot.duration_hours)
        .bind(booking.total_price)
        .bind(Json(&booking.messages))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    #[instrument(skip_all, fields(booking_id = %id))]
    async fn reschedule_booking(
        &self,
        id: Uuid,
        slot: TimeSlot,
        total_price: f64,
    ) -> AppResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        let listing_id: Option<Uuid> =
            sqlx::query_scalar("SELECT listing_id FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(listing_id) = listing_id else {
            return Ok(None);
        };

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM listings WHERE id = $1 AND status = 'active' FOR UPDATE",
        )
        .bind(listing_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("listing"));
        }

        let existing =
            Self::active_bookings_with(&mut *tx, listing_id, slot.date, Some(id)).await?;
        if let Some(conflict) = find_conflict(&slot, &existing, Some(id)) {
            return Err(AppError::booking_conflict(conflict.clone()));
        }

        let updated = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET booking_date = $2,
                start_time = $3,
                duration_hours = $4,
                total_price = $5,
                status = 'pending',
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(slot.date)
        .bind(slot.start)
        .bind(slot.duration_hours)
        .bind(total_price)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn booking_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn push_booking_message(
        &self,
        id: Uuid,
        message: BookingMessage,
    ) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET messages = messages || $2::JSONB, updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(vec![message]))
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn bookings_for_user(
        &self,
        user_id: Uuid,
        role: BookingRole,
    ) -> AppResult<Vec<Booking>> {
        let column = match role {
            BookingRole::Customer => "customer_id",
            BookingRole::Provider => "provider_id",
        };

        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE {column} = $1
            ORDER BY booking_date DESC, start_time DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    #[instrument(skip_all, fields(listing_id = %review.listing_id))]
    async fn insert_review(&self, review: NewReview) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews (id, listing_id, customer_id, provider_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(review.listing_id)
        .bind(review.customer_id)
        .bind(review.provider_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn update_review(
        &self,
        id: Uuid,
        rating: i16,
        comment: &str,
    ) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET rating = $2, comment = $3
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn set_review_response(&self, id: Uuid, response: &str) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET provider_response = $2
            WHERE id = $1 AND provider_response IS NULL
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(response)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn reviews_for_listing(
        &self,
        listing_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>> {
        self.paged_reviews("listing_id", listing_id, page).await
    }

    async fn listing_rating(&self, listing_id: Uuid) -> AppResult<RatingStats> {
        let stats = sqlx::query_as::<_, RatingStats>(
            r#"
            SELECT COALESCE(AVG(rating)::DOUBLE PRECISION, 0) AS average_rating,
                   COUNT(*) AS reviews_count
            FROM reviews
            WHERE listing_id = $1
            "#,
        )
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn reviews_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>> {
        self.paged_reviews("provider_id", provider_id, page).await
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Postgres store closed");
    }
}
