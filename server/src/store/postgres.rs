use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{
    check_capacity, NewOrganizer, NewTicketGroup, RecordedPayment, ScanMark, SoldTicket,
    TicketingStore,
};
use crate::models::ticket_group::TicketGroupWithTickets;
use crate::models::{
    EmittedTicket, Event, Organizer, Payment, Role, TicketGroup, TicketGroupStatus, TicketType,
    User,
};
use crate::utils::error::{AppError, AppResult};

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

const ORGANIZER_SELECT: &str = "SELECT o.user_id, u.name, u.email, u.role, o.code, \
     o.chief_organizer_id, o.created_at \
     FROM organizers o JOIN users u ON u.id = o.user_id";

const EVENT_COLUMNS: &str =
    "id, name, description, location, starts_at, ends_at, image_url, active, created_at, updated_at";

const TICKET_TYPE_COLUMNS: &str = "id, event_id, name, description, category, price, \
     max_available, max_per_purchase, visible_in_web, sale_starts_at, sale_ends_at, scan_limit, \
     created_at, updated_at";

const GROUP_COLUMNS: &str = "id, event_id, status, amount_tickets, total_price, invitation_code, \
     organizer_id, payment_id, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, ticket_group_id, ticket_type_id, event_id, price, full_name, dni, \
     mail, gender, phone, birth_date, instagram, scanned_at, scanned_by, created_at";

const ORGANIZER_CODE_KEY: &str = "organizers_code_key";

// Rows that hold stock: settled groups, or unpaid ones newer than the cutoff.
const HELD_FILTER: &str = "(g.status <> 'unpaid' OR g.created_at > $2)";

fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message()),
        _ => AppError::DatabaseError(err),
    }
}

/// PostgreSQL implementation of TicketingStore
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_organizer<'e, E>(executor: E, user_id: Uuid) -> AppResult<Option<Organizer>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let organizer = sqlx::query_as::<_, Organizer>(&format!(
            "{ORGANIZER_SELECT} WHERE o.user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(organizer)
    }
}

#[async_trait]
impl TicketingStore for PgStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let email = user.email.clone();
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("A user with email {} already exists", email)))
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let previous: Role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if previous == Role::ChiefOrganizer && role != Role::ChiefOrganizer {
            sqlx::query("UPDATE organizers SET chief_organizer_id = NULL WHERE chief_organizer_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if !role.is_organizer() {
            sqlx::query("DELETE FROM organizers WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        } else if role == Role::ChiefOrganizer {
            sqlx::query("UPDATE organizers SET chief_organizer_id = NULL WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn create_organizer(
        &self,
        user_id: Uuid,
        role: Role,
        code: &str,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<NewOrganizer> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let already: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organizers WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if already {
            return Err(AppError::Conflict(format!(
                "User {} is already an organizer",
                user_id
            )));
        }

        let inserted = sqlx::query(
            "INSERT INTO organizers (user_id, code, chief_organizer_id) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(code)
        .bind(chief_organizer_id)
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(ORGANIZER_CODE_KEY) => {
                return Ok(NewOrganizer::CodeTaken);
            }
            Err(e) => {
                return Err(conflict_on_unique(e, || {
                    format!("User {} is already an organizer", user_id)
                }))
            }
        }

        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;

        let organizer = Self::fetch_organizer(&mut *tx, user_id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("organizer vanished".into()))?;

        tx.commit().await?;
        Ok(NewOrganizer::Created(organizer))
    }

    async fn get_organizer(&self, user_id: Uuid) -> AppResult<Organizer> {
        Self::fetch_organizer(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organizer {} not found", user_id)))
    }

    async fn find_organizer_by_code(&self, code: &str) -> AppResult<Option<Organizer>> {
        let organizer = sqlx::query_as::<_, Organizer>(&format!("{ORGANIZER_SELECT} WHERE o.code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(organizer)
    }

    async fn list_organizers(&self) -> AppResult<Vec<Organizer>> {
        let organizers =
            sqlx::query_as::<_, Organizer>(&format!("{ORGANIZER_SELECT} ORDER BY o.created_at"))
                .fetch_all(&self.pool)
                .await?;
        Ok(organizers)
    }

    async fn set_chief_organizer(
        &self,
        user_id: Uuid,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<Organizer> {
        let updated = sqlx::query("UPDATE organizers SET chief_organizer_id = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(chief_organizer_id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Organizer {} not found", user_id)));
        }
        self.get_organizer(user_id).await
    }

    async fn create_event(&self, event: Event) -> AppResult<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.image_url)
        .bind(event.active)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Event> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    async fn list_events(&self, only_active: bool) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE active OR NOT $1 ORDER BY starts_at"
        ))
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn update_event(&self, event: Event) -> AppResult<Event> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET name = $2, description = $3, location = $4, starts_at = $5, \
             ends_at = $6, image_url = $7, active = $8, updated_at = $9 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.image_url)
        .bind(event.active)
        .bind(event.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event.id)))
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let has_groups: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ticket_groups WHERE event_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_groups {
            return Err(AppError::Conflict(
                "Event has emitted tickets and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM ticket_types WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_ticket_type(&self, tt: TicketType) -> AppResult<TicketType> {
        let created = sqlx::query_as::<_, TicketType>(&format!(
            "INSERT INTO ticket_types ({TICKET_TYPE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(tt.id)
        .bind(tt.event_id)
        .bind(&tt.name)
        .bind(&tt.description)
        .bind(tt.category)
        .bind(tt.price)
        .bind(tt.max_available)
        .bind(tt.max_per_purchase)
        .bind(tt.visible_in_web)
        .bind(tt.sale_starts_at)
        .bind(tt.sale_ends_at)
        .bind(tt.scan_limit)
        .bind(tt.created_at)
        .bind(tt.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::NotFound(format!("Event {} not found", tt.event_id))
            }
            _ => AppError::DatabaseError(e),
        })?;
        Ok(created)
    }

    async fn get_ticket_type(&self, id: Uuid) -> AppResult<TicketType> {
        sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", id)))
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        let types = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE event_id = $1 \
             ORDER BY created_at, name"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    async fn update_ticket_type(
        &self,
        tt: TicketType,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketType> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM ticket_types WHERE id = $1 FOR UPDATE")
                .bind(tt.id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Ticket type {} not found", tt.id)));
        }

        let held: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM emitted_tickets t \
             JOIN ticket_groups g ON g.id = t.ticket_group_id \
             WHERE t.ticket_type_id = $1 AND {HELD_FILTER}"
        ))
        .bind(tt.id)
        .bind(hold_cutoff)
        .fetch_one(&mut *tx)
        .await?;
        if i64::from(tt.max_available) < held {
            return Err(AppError::Conflict(format!(
                "Capacity can't go below the {} tickets already issued",
                held
            )));
        }

        let updated = sqlx::query_as::<_, TicketType>(&format!(
            "UPDATE ticket_types SET name = $2, description = $3, category = $4, price = $5, \
             max_available = $6, max_per_purchase = $7, visible_in_web = $8, \
             sale_starts_at = $9, sale_ends_at = $10, scan_limit = $11, updated_at = $12 \
             WHERE id = $1 RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(tt.id)
        .bind(&tt.name)
        .bind(&tt.description)
        .bind(tt.category)
        .bind(tt.price)
        .bind(tt.max_available)
        .bind(tt.max_per_purchase)
        .bind(tt.visible_in_web)
        .bind(tt.sale_starts_at)
        .bind(tt.sale_ends_at)
        .bind(tt.scan_limit)
        .bind(tt.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_ticket_type(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let has_tickets: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM emitted_tickets WHERE ticket_type_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_tickets {
            return Err(AppError::Conflict(
                "Ticket type has emitted tickets and cannot be deleted".to_string(),
            ));
        }

        let deleted = sqlx::query("DELETE FROM ticket_types WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Ticket type {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn held_counts(
        &self,
        event_id: Uuid,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(&format!(
            "SELECT t.ticket_type_id, COUNT(*) FROM emitted_tickets t \
             JOIN ticket_groups g ON g.id = t.ticket_group_id \
             WHERE t.event_id = $1 AND {HELD_FILTER} \
             GROUP BY t.ticket_type_id"
        ))
        .bind(event_id)
        .bind(hold_cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn create_ticket_group(
        &self,
        order: NewTicketGroup,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketGroupWithTickets> {
        let requested = order.requested_by_type();
        let mut type_ids: Vec<Uuid> = requested.keys().copied().collect();
        // Fixed lock order so concurrent purchases can't deadlock.
        type_ids.sort();

        let mut tx = self.pool.begin().await?;

        let types = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = ANY($1) \
             ORDER BY id FOR UPDATE"
        ))
        .bind(&type_ids)
        .fetch_all(&mut *tx)
        .await?;

        let held: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(&format!(
            "SELECT t.ticket_type_id, COUNT(*) FROM emitted_tickets t \
             JOIN ticket_groups g ON g.id = t.ticket_group_id \
             WHERE t.ticket_type_id = ANY($1) AND {HELD_FILTER} \
             GROUP BY t.ticket_type_id"
        ))
        .bind(&type_ids)
        .bind(hold_cutoff)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        for type_id in &type_ids {
            let ticket_type = types
                .iter()
                .find(|tt| tt.id == *type_id)
                .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", type_id)))?;
            if ticket_type.event_id != order.group.event_id {
                return Err(AppError::ValidationError(format!(
                    "Ticket type {} does not belong to event {}",
                    type_id, order.group.event_id
                )));
            }
            check_capacity(
                ticket_type,
                held.get(type_id).copied().unwrap_or(0),
                requested.get(type_id).copied().unwrap_or(0),
            )?;
        }

        let g = &order.group;
        let group = sqlx::query_as::<_, TicketGroup>(&format!(
            "INSERT INTO ticket_groups ({GROUP_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {GROUP_COLUMNS}"
        ))
        .bind(g.id)
        .bind(g.event_id)
        .bind(g.status)
        .bind(g.amount_tickets)
        .bind(g.total_price)
        .bind(&g.invitation_code)
        .bind(g.organizer_id)
        .bind(&g.payment_id)
        .bind(g.created_at)
        .bind(g.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let insert_ticket = format!(
            "INSERT INTO emitted_tickets ({TICKET_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {TICKET_COLUMNS}"
        );
        let mut tickets = Vec::with_capacity(order.tickets.len());
        for t in &order.tickets {
            let ticket = sqlx::query_as::<_, EmittedTicket>(&insert_ticket)
                .bind(t.id)
                .bind(t.ticket_group_id)
                .bind(t.ticket_type_id)
                .bind(t.event_id)
                .bind(t.price)
                .bind(&t.full_name)
                .bind(&t.dni)
                .bind(&t.mail)
                .bind(t.gender)
                .bind(&t.phone)
                .bind(t.birth_date)
                .bind(&t.instagram)
                .bind(t.scanned_at)
                .bind(t.scanned_by)
                .bind(t.created_at)
                .fetch_one(&mut *tx)
                .await?;
            tickets.push(ticket);
        }

        tx.commit().await?;
        Ok(TicketGroupWithTickets { group, tickets })
    }

    async fn get_ticket_group(&self, id: Uuid) -> AppResult<TicketGroupWithTickets> {
        let group = sqlx::query_as::<_, TicketGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM ticket_groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket group {} not found", id)))?;

        let tickets = sqlx::query_as::<_, EmittedTicket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM emitted_tickets WHERE ticket_group_id = $1 \
             ORDER BY created_at, full_name"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(TicketGroupWithTickets { group, tickets })
    }

    async fn record_payment(
        &self,
        payment: Payment,
        mark_paid: bool,
    ) -> AppResult<RecordedPayment> {
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, TicketGroup>(&format!(
            "SELECT {GROUP_COLUMNS} FROM ticket_groups WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment.ticket_group_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Ticket group {} not found", payment.ticket_group_id))
        })?;

        sqlx::query(
            "INSERT INTO payments (id, ticket_group_id, status, amount, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, \
             amount = EXCLUDED.amount, updated_at = NOW()",
        )
        .bind(&payment.id)
        .bind(payment.ticket_group_id)
        .bind(&payment.status)
        .bind(payment.amount)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        let settled = mark_paid && group.status == TicketGroupStatus::Unpaid;
        let group = if settled {
            sqlx::query_as::<_, TicketGroup>(&format!(
                "UPDATE ticket_groups SET status = $2, payment_id = $3, updated_at = NOW() \
                 WHERE id = $1 RETURNING {GROUP_COLUMNS}"
            ))
            .bind(group.id)
            .bind(TicketGroupStatus::Paid)
            .bind(&payment.id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            group
        };

        tx.commit().await?;
        Ok(RecordedPayment { group, settled })
    }

    async fn get_ticket(&self, id: Uuid) -> AppResult<EmittedTicket> {
        sqlx::query_as::<_, EmittedTicket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM emitted_tickets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }

    async fn mark_scanned(
        &self,
        id: Uuid,
        scanned_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<ScanMark> {
        let marked = sqlx::query_as::<_, EmittedTicket>(&format!(
            "UPDATE emitted_tickets SET scanned_at = $2, scanned_by = $3 \
             WHERE id = $1 AND scanned_at IS NULL RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .bind(scanned_by)
        .fetch_optional(&self.pool)
        .await?;

        match marked {
            Some(ticket) => Ok(ScanMark::Marked(ticket)),
            None => self.get_ticket(id).await.map(ScanMark::AlreadyScanned),
        }
    }

    async fn clear_scan(&self, id: Uuid) -> AppResult<EmittedTicket> {
        sqlx::query_as::<_, EmittedTicket>(&format!(
            "UPDATE emitted_tickets SET scanned_at = NULL, scanned_by = NULL \
             WHERE id = $1 RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }

    async fn event_sales(&self, event_id: Uuid) -> AppResult<Vec<SoldTicket>> {
        let sales = sqlx::query_as::<_, SoldTicket>(
            "SELECT t.id, t.ticket_group_id, t.ticket_type_id, t.event_id, t.price, t.full_name, \
             t.dni, t.mail, t.gender, t.phone, t.birth_date, t.instagram, t.scanned_at, \
             t.scanned_by, t.created_at, tt.name AS ticket_type_name, g.status AS group_status, \
             g.organizer_id \
             FROM emitted_tickets t \
             JOIN ticket_groups g ON g.id = t.ticket_group_id \
             JOIN ticket_types tt ON tt.id = t.ticket_type_id \
             WHERE t.event_id = $1 AND g.status <> 'unpaid' \
             ORDER BY t.created_at, t.full_name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}
