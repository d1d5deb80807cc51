//! JSON fixtures shared by the service and CLI tests

use serde_json::{json, Value};

/// Restricted experiment owned by alice with bob as a named viewer
pub fn restricted_experiment() -> Value {
    json!({
        "id": 42,
        "title": "Acid-base titration",
        "content": {
            "steps": ["Fill the burette", "Add indicator"],
            "permissions": {
                "visibility": "restricted",
                "userPermissions": [
                    {"userId": "kc-alice", "username": "alice", "email": "alice@lab.edu",
                     "role": "admin", "isOwner": true, "addedAt": "2024-03-01T10:00:00Z"},
                    {"username": "bob", "role": "viewer", "isOwner": false,
                     "addedAt": "2024-03-02T10:00:00Z"}
                ]
            }
        }
    })
}

pub fn user(username: &str) -> Value {
    json!({ "preferred_username": username })
}
