use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use ticketing_server::config::Config;
use ticketing_server::models::Role;
use ticketing_server::payments::{MockPaymentProvider, PaymentStatus, ProviderPayment};
use ticketing_server::routes::create_routes;
use ticketing_server::state::AppState;
use ticketing_server::store::MemoryStore;

struct TestApp {
    app: Router,
    state: AppState,
    payments: Arc<MockPaymentProvider>,
    admin: String,
}

impl TestApp {
    fn new() -> Self {
        let payments = Arc::new(MockPaymentProvider::new("http://localhost:3000"));
        let state = AppState::new(
            Config::for_memory("integration-secret"),
            Arc::new(MemoryStore::new()),
            payments.clone(),
        );
        let app = create_routes(state.clone());
        let mut test_app = Self {
            app,
            state,
            payments,
            admin: String::new(),
        };
        test_app.admin = test_app.token(Uuid::new_v4(), Role::Admin);
        test_app
    }

    fn token(&self, user_id: Uuid, role: Role) -> String {
        self.state
            .jwt
            .issue(user_id, role, chrono::Duration::hours(1))
            .unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_event(&self, active: bool) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/events",
                Some(self.admin.as_str()),
                Some(json!({
                    "name": "Noche de Verano",
                    "location": "Costanera Sur",
                    "starts_at": "2099-01-10T22:00:00Z",
                    "ends_at": "2099-01-11T06:00:00Z",
                    "active": active
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_ticket_type(
        &self,
        event_id: &str,
        category: &str,
        price: &str,
        max_available: i32,
    ) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/events/{event_id}/ticket-types"),
                Some(self.admin.as_str()),
                Some(json!({
                    "name": format!("{category} entry"),
                    "category": category,
                    "price": price,
                    "max_available": max_available,
                    "max_per_purchase": 4
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Creates a user and turns them into an organizer; returns (id, code).
    async fn create_organizer(&self, name: &str, chief_of: Option<&str>) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/users",
                Some(self.admin.as_str()),
                Some(json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase())
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let user_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .send(
                Method::POST,
                "/organizers",
                Some(self.admin.as_str()),
                Some(json!({ "user_id": user_id, "chief_organizer_id": chief_of })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (user_id, body["data"]["code"].as_str().unwrap().to_string())
    }

    async fn purchase(
        &self,
        event_id: &str,
        ticket_type_id: &str,
        buyers: usize,
        code: Option<&str>,
    ) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/ticket-groups",
            None,
            Some(json!({
                "event_id": event_id,
                "invitation_code": code,
                "items": [{ "ticket_type_id": ticket_type_id, "buyers": buyers_json(buyers) }]
            })),
        )
        .await
    }
}

fn buyers_json(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "full_name": format!("Buyer {i}"),
                "dni": format!("3011122{i}"),
                "mail": format!("buyer{i}@example.com"),
                "gender": if i % 2 == 0 { "female" } else { "male" },
                "phone": "1155550000",
                "birth_date": "1995-03-14",
                "instagram": null
            })
        })
        .collect()
}

fn ticket_ids(group: &Value) -> Vec<String> {
    group["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new();
    let event = json!({
        "name": "X",
        "location": "Y",
        "starts_at": "2099-01-10T22:00:00Z",
        "ends_at": "2099-01-11T06:00:00Z"
    });

    let (status, body) = app
        .send(Method::POST, "/events", None, Some(event.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");

    let ticketing = app.token(Uuid::new_v4(), Role::Ticketing);
    let (status, _) = app
        .send(Method::POST, "/events", Some(ticketing.as_str()), Some(event))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/events", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_validation_and_visibility() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            Method::POST,
            "/events",
            Some(app.admin.as_str()),
            Some(json!({
                "name": "Backwards",
                "location": "Club",
                "starts_at": "2099-01-11T06:00:00Z",
                "ends_at": "2099-01-10T22:00:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let hidden = app.create_event(false).await;
    let shown = app.create_event(true).await;

    let (status, _) = app
        .send(Method::GET, &format!("/events/{hidden}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::GET, &format!("/events/{hidden}"), Some(app.admin.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/events", None, None).await;
    let listed: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![shown.as_str()]);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/events/{hidden}/active"),
            Some(app.admin.as_str()),
            Some(json!({ "active": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], true);
}

#[tokio::test]
async fn test_ticket_type_listing_hides_unlisted_types() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 10).await;

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/events/{event}/ticket-types"),
            Some(app.admin.as_str()),
            Some(json!({
                "name": "Backstage",
                "category": "paid",
                "price": "9000",
                "max_available": 5,
                "max_per_purchase": 1,
                "visible_in_web": false
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/events/{event}/ticket-types"),
            Some(app.admin.as_str()),
            Some(json!({
                "name": "Broken",
                "category": "free",
                "price": "100",
                "max_available": 5,
                "max_per_purchase": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .send(Method::GET, &format!("/events/{event}/ticket-types"), None, None)
        .await;
    let public = body["data"].as_array().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0]["id"], general.as_str());
    assert_eq!(public[0]["remaining"], 10);

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/events/{event}/ticket-types"),
            Some(app.admin.as_str()),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_purchase_reserves_stock_until_sold_out() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 3).await;

    let (status, body) = app.purchase(&event, &general, 2, None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "unpaid");
    assert_eq!(body["data"]["amount_tickets"], 2);
    assert_eq!(ticket_ids(&body["data"]).len(), 2);
    let checkout_url = body["data"]["checkout_url"].as_str().unwrap();
    assert!(checkout_url.contains("/checkout/mock/"));

    let checkouts = app.payments.checkouts();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].lines[0].quantity, 2);
    assert!(checkouts[0].notification_url.ends_with("/payments/webhook"));

    let (status, body) = app.purchase(&event, &general, 2, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("remaining 1"));

    let (status, _) = app.purchase(&event, &general, 1, None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_purchase_rejects_invalid_requests() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;

    let (status, _) = app.purchase(&event, &general, 5, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "over max_per_purchase");

    let (status, _) = app.purchase(&event, &guest, 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "free types need a code");

    let (status, _) = app.purchase(&event, &general, 1, Some("ZZZZ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "malformed code");

    let other_event = app.create_event(true).await;
    let (status, _) = app.purchase(&other_event, &general, 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "type from another event");

    let mut buyer = buyers_json(1).remove(0);
    buyer["dni"] = json!("12ab");
    let (status, _) = app
        .send(
            Method::POST,
            "/ticket-groups",
            None,
            Some(json!({
                "event_id": event,
                "items": [{ "ticket_type_id": general, "buyers": [buyer] }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "bad dni");
}

#[tokio::test]
async fn test_invitation_code_attribution() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;
    let (organizer_id, code) = app.create_organizer("Lucia", None).await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/invitation-codes/ {} ", code.to_lowercase()).replace(' ', "%20"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["organizer_id"], organizer_id.as_str());
    assert_eq!(body["data"]["code"], code.as_str());

    let (status, _) = app
        .send(Method::GET, "/invitation-codes/AB1", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .purchase(&event, &guest, 2, Some(code.to_lowercase().as_str()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "free");
    assert_eq!(body["data"]["organizer_id"], organizer_id.as_str());
    assert_eq!(body["data"]["invitation_code"], code.as_str());
    assert!(body["data"]["checkout_url"].is_null());
}

#[tokio::test]
async fn test_organizers_issue_free_invitations_only() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;
    let (organizer_id, _) = app.create_organizer("Mateo", None).await;
    let organizer = app.token(organizer_id.parse().unwrap(), Role::Organizer);

    let issue = |ticket_type: &str| {
        json!({ "items": [{ "ticket_type_id": ticket_type, "buyers": buyers_json(1) }] })
    };

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/events/{event}/invitations"),
            Some(organizer.as_str()),
            Some(issue(&guest)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "free");
    assert_eq!(body["data"]["organizer_id"], organizer_id.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/events/{event}/invitations"),
            Some(organizer.as_str()),
            Some(issue(&general)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/events/{event}/invitations"),
            Some(app.admin.as_str()),
            Some(issue(&guest)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_scan_flow() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;
    let (_, code) = app.create_organizer("Sofia", None).await;

    let (_, body) = app.purchase(&event, &guest, 1, Some(code.as_str())).await;
    let ticket = ticket_ids(&body["data"]).remove(0);
    let scanner = app.token(Uuid::new_v4(), Role::Ticketing);
    let other_scanner = app.token(Uuid::new_v4(), Role::Ticketing);
    let scan_uri = format!("/events/{event}/scan");

    let (status, body) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(scanner.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["duplicate"], false);
    assert_eq!(body["data"]["full_name"], "Buyer 0");

    let (status, body) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(scanner.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["duplicate"], true);

    let (status, body) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(other_scanner.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already scanned"));

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/tickets/{ticket}/scan"),
            Some(app.admin.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(other_scanner.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["duplicate"], false);

    let (_, body) = app.purchase(&event, &general, 1, None).await;
    let unpaid = ticket_ids(&body["data"]).remove(0);
    let (status, _) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(scanner.as_str()),
            Some(json!({ "ticket_id": unpaid })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let organizer = app.token(Uuid::new_v4(), Role::Organizer);
    let (status, _) = app
        .send(
            Method::POST,
            &scan_uri,
            Some(organizer.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_webhook_marks_group_paid() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;

    let (_, body) = app.purchase(&event, &general, 2, None).await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    app.payments.set_payment(ProviderPayment {
        id: "9001".to_string(),
        status: PaymentStatus::Approved,
        amount: Decimal::new(3000, 0),
        external_reference: Some(group_id.clone()),
    });

    let notification = json!({ "type": "payment", "action": "payment.updated", "data": { "id": "9001" } });
    let (status, body) = app
        .send(
            Method::POST,
            "/payments/webhook",
            None,
            Some(notification.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["outcome"], "recorded");
    assert_eq!(body["data"]["group_status"], "paid");

    let (status, body) = app
        .send(Method::POST, "/payments/webhook", None, Some(notification))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["group_status"], "paid");

    let (_, body) = app
        .send(Method::GET, &format!("/ticket-groups/{group_id}"), None, None)
        .await;
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["payment_id"], "9001");

    let (status, body) = app
        .send(
            Method::POST,
            "/payments/webhook",
            None,
            Some(json!({ "type": "merchant_order", "data": { "id": "1" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "ignored");
}

#[tokio::test]
async fn test_rejected_payment_leaves_group_unpaid() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;
    let (_, body) = app.purchase(&event, &general, 1, None).await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    app.payments.set_payment(ProviderPayment {
        id: "77".to_string(),
        status: PaymentStatus::Rejected,
        amount: Decimal::new(1500, 0),
        external_reference: Some(group_id.clone()),
    });

    let (status, body) = app
        .send(
            Method::POST,
            "/payments/webhook",
            None,
            Some(json!({ "type": "payment", "data": { "id": 77 } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["payment_status"], "rejected");
    assert_eq!(body["data"]["group_status"], "unpaid");
}

#[tokio::test]
async fn test_stats_are_scoped_by_organizer() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;

    let (chief_id, chief_code) = app.create_organizer("Chief", None).await;
    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/users/{chief_id}/role"),
            Some(app.admin.as_str()),
            Some(json!({ "role": "chief_organizer" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (team_id, team_code) = app.create_organizer("Team", Some(chief_id.as_str())).await;
    let (_, other_code) = app.create_organizer("Other", None).await;

    app.purchase(&event, &guest, 1, Some(chief_code.as_str())).await;
    app.purchase(&event, &guest, 2, Some(team_code.as_str())).await;
    app.purchase(&event, &guest, 3, Some(other_code.as_str())).await;

    let stats_uri = format!("/events/{event}/stats");

    let (status, body) = app
        .send(Method::GET, &stats_uri, Some(app.admin.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total_sold"], 6);
    assert_eq!(body["data"]["by_organizer"].as_array().unwrap().len(), 3);

    let chief = app.token(chief_id.parse().unwrap(), Role::ChiefOrganizer);
    let (_, body) = app.send(Method::GET, &stats_uri, Some(chief.as_str()), None).await;
    assert_eq!(body["data"]["total_sold"], 3);

    let team = app.token(team_id.parse().unwrap(), Role::Organizer);
    let (_, body) = app.send(Method::GET, &stats_uri, Some(team.as_str()), None).await;
    assert_eq!(body["data"]["total_sold"], 2);

    let (_, body) = app
        .send(Method::GET, &format!("/events/{event}/buyers"), Some(team.as_str()), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let ticketing = app.token(Uuid::new_v4(), Role::Ticketing);
    let (status, _) = app
        .send(Method::GET, &stats_uri, Some(ticketing.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            Method::POST,
            "/users",
            Some(app.admin.as_str()),
            Some(json!({ "name": "Org", "email": "org@example.com", "role": "organizer" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(app.admin.as_str()),
            Some(json!({ "name": "Door", "email": " Door@Example.com ", "role": "ticketing" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "door@example.com");

    let (status, _) = app
        .send(
            Method::POST,
            "/users",
            Some(app.admin.as_str()),
            Some(json!({ "name": "Again", "email": "door@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (organizer_id, code) = app.create_organizer("Demoted", None).await;
    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/users/{organizer_id}/role"),
            Some(app.admin.as_str()),
            Some(json!({ "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");

    let (status, _) = app
        .send(Method::GET, &format!("/invitation-codes/{code}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.send(Method::GET, "/users", Some(app.admin.as_str()), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_revenue_keeps_price_charged_at_sale() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1000", 50).await;
    let (_, body) = app.purchase(&event, &general, 1, None).await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    app.payments.set_payment(ProviderPayment {
        id: "5150".to_string(),
        status: PaymentStatus::Approved,
        amount: Decimal::new(1000, 0),
        external_reference: Some(group_id),
    });
    let (status, body) = app
        .send(
            Method::POST,
            "/payments/webhook",
            None,
            Some(json!({ "type": "payment", "data": { "id": "5150" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["group_status"], "paid");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/ticket-types/{general}"),
            Some(app.admin.as_str()),
            Some(json!({ "price": "5000" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/events/{event}/stats"),
            Some(app.admin.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(decimal(&body["data"]["revenue"]), Decimal::new(1000, 0));
    assert_eq!(
        decimal(&body["data"]["by_ticket_type"][0]["revenue"]),
        Decimal::new(1000, 0)
    );
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/ticket-groups", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app.send(Method::GET, "/events/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::PUT,
            "/ticket-types/42",
            Some(app.admin.as_str()),
            Some(json!({ "price": "10" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_scan_rejects_other_event_and_expired_types() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let other_event = app.create_event(true).await;
    let guest = app.create_ticket_type(&event, "free", "0", 50).await;
    let (_, code) = app.create_organizer("Bruno", None).await;
    let scanner = app.token(Uuid::new_v4(), Role::Ticketing);

    let (_, body) = app.purchase(&event, &guest, 1, Some(code.as_str())).await;
    let ticket = ticket_ids(&body["data"]).remove(0);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/events/{other_event}/scan"),
            Some(scanner.as_str()),
            Some(json!({ "ticket_id": ticket })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/events/{event}/ticket-types"),
            Some(app.admin.as_str()),
            Some(json!({
                "name": "Early guest",
                "category": "free",
                "price": "0",
                "max_available": 10,
                "max_per_purchase": 2,
                "scan_limit": "2000-01-01T00:00:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let early = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.purchase(&event, &early, 1, Some(code.as_str())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let expired = ticket_ids(&body["data"]).remove(0);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/events/{event}/scan"),
            Some(scanner.as_str()),
            Some(json!({ "ticket_id": expired })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_capacity_cannot_drop_below_held_stock() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 5).await;

    let (status, _) = app.purchase(&event, &general, 3, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/ticket-types/{general}");
    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(app.admin.as_str()),
            Some(json!({ "max_available": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(app.admin.as_str()),
            Some(json!({ "max_available": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["max_available"], 3);

    let (status, _) = app.purchase(&event, &general, 1, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_assign_chief_rules() {
    let app = TestApp::new();
    let promote = |id: String| {
        let app = &app;
        async move {
            let (status, _) = app
                .send(
                    Method::PATCH,
                    &format!("/users/{id}/role"),
                    Some(app.admin.as_str()),
                    Some(json!({ "role": "chief_organizer" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            id
        }
    };
    let chief_a = promote(app.create_organizer("ChiefA", None).await.0).await;
    let chief_b = promote(app.create_organizer("ChiefB", None).await.0).await;
    let (plain, _) = app.create_organizer("Plain", None).await;
    let (member, _) = app.create_organizer("Member", None).await;

    let assign = |organizer: String, chief: String| {
        let app = &app;
        async move {
            app.send(
                Method::PATCH,
                &format!("/organizers/{organizer}/chief"),
                Some(app.admin.as_str()),
                Some(json!({ "chief_organizer_id": chief })),
            )
            .await
        }
    };

    let (status, body) = assign(chief_b.clone(), chief_a.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = assign(member.clone(), plain.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = assign(member.clone(), chief_a.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["chief_organizer_id"], chief_a.as_str());
}

#[tokio::test]
async fn test_short_approved_payment_is_recorded_but_not_settled() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 50).await;
    let (_, body) = app.purchase(&event, &general, 2, None).await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    app.payments.set_payment(ProviderPayment {
        id: "3131".to_string(),
        status: PaymentStatus::Approved,
        amount: Decimal::new(1000, 0),
        external_reference: Some(group_id.clone()),
    });

    let (status, body) = app
        .send(
            Method::POST,
            "/payments/webhook",
            None,
            Some(json!({ "type": "payment", "data": { "id": "3131" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["outcome"], "recorded");
    assert_eq!(body["data"]["payment_status"], "approved");
    assert_eq!(body["data"]["group_status"], "unpaid");

    let (_, body) = app
        .send(Method::GET, &format!("/ticket-groups/{group_id}"), None, None)
        .await;
    assert_eq!(body["data"]["status"], "unpaid");
    assert_eq!(body["data"]["payment_id"], Value::Null);
}

#[tokio::test]
async fn test_public_listing_hides_types_outside_sale_window() {
    let app = TestApp::new();
    let event = app.create_event(true).await;
    let general = app.create_ticket_type(&event, "paid", "1500", 10).await;

    for (name, window) in [
        ("Presale", json!({ "sale_starts_at": "2098-06-01T00:00:00Z" })),
        ("Launch", json!({ "sale_ends_at": "2000-01-01T00:00:00Z" })),
    ] {
        let mut request = json!({
            "name": name,
            "category": "paid",
            "price": "1200",
            "max_available": 10,
            "max_per_purchase": 2
        });
        for (key, value) in window.as_object().unwrap() {
            request[key] = value.clone();
        }
        let (status, body) = app
            .send(
                Method::POST,
                &format!("/events/{event}/ticket-types"),
                Some(app.admin.as_str()),
                Some(request),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (_, body) = app
        .send(Method::GET, &format!("/events/{event}/ticket-types"), None, None)
        .await;
    let public = body["data"].as_array().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0]["id"], general.as_str());

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/events/{event}/ticket-types"),
            Some(app.admin.as_str()),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}
