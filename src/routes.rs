use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::store::{Author, BlogPost, NewPost, PostPatch};
use crate::Repo;

// ─── Models ───

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

fn err(status: Status, msg: &str, code: &str) -> (Status, Json<ApiError>) {
    (status, Json(ApiError { error: msg.to_string(), code: code.to_string() }))
}

fn db_err(msg: &str) -> (Status, Json<ApiError>) {
    err(Status::InternalServerError, msg, "DB_ERROR")
}

#[derive(Serialize)]
pub struct PostResponse {
    pub id: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub created: String,
}

impl From<BlogPost> for PostResponse {
    fn from(post: BlogPost) -> Self {
        PostResponse {
            id: post.id,
            author: post.author.display(),
            title: post.title,
            content: post.content,
            created: post.created.to_rfc3339(),
        }
    }
}

// ─── Request bodies ───

#[derive(Deserialize)]
pub struct CreatePostReq {
    pub author: Author,
    pub title: String,
    pub content: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdatePostReq {
    pub id: Option<String>,
    pub author: Option<Author>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

// ─── Routes ───

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

#[get("/posts")]
pub fn list_posts(db: &State<Repo>) -> Result<Json<Vec<PostResponse>>, (Status, Json<ApiError>)> {
    let posts = db.find_all().map_err(|e| db_err(&e.to_string()))?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

#[post("/posts", format = "json", data = "<req>")]
pub fn create_post(req: Json<CreatePostReq>, db: &State<Repo>) -> Result<(Status, Json<PostResponse>), (Status, Json<ApiError>)> {
    let req = req.into_inner();
    let required = [
        ("author.firstName", &req.author.first_name),
        ("author.lastName", &req.author.last_name),
        ("title", &req.title),
        ("content", &req.content),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(err(Status::UnprocessableEntity, &format!("{} is required", field), "VALIDATION_ERROR"));
        }
    }

    let new_post = NewPost {
        author: req.author,
        title: req.title,
        content: req.content,
        created: req.created,
    };
    let ids = db.insert_many(std::slice::from_ref(&new_post)).map_err(|e| db_err(&e.to_string()))?;

    // Read the record back so the response reflects stored state,
    // including the defaulted creation time.
    let post = db
        .find_by_id(&ids[0])
        .map_err(|e| db_err(&e.to_string()))?
        .ok_or_else(|| db_err("inserted record missing"))?;
    Ok((Status::Created, Json(post.into())))
}

#[put("/posts/<id>", format = "json", data = "<req>")]
pub fn update_post(id: &str, req: Json<UpdatePostReq>, db: &State<Repo>) -> Result<Status, (Status, Json<ApiError>)> {
    let req = req.into_inner();
    if let Some(body_id) = req.id.as_deref() {
        if body_id != id {
            return Err(err(Status::UnprocessableEntity, "Path id and body id do not match", "ID_MISMATCH"));
        }
    }

    let patch = PostPatch {
        author: req.author,
        title: req.title,
        content: req.content,
        created: req.created,
    };
    let updated = db.update_by_id(id, &patch).map_err(|e| db_err(&e.to_string()))?;
    if !updated {
        return Err(err(Status::NotFound, "Post not found", "NOT_FOUND"));
    }
    Ok(Status::NoContent)
}

#[delete("/posts/<id>")]
pub fn delete_post(id: &str, db: &State<Repo>) -> Result<Status, (Status, Json<ApiError>)> {
    // Idempotent: deleting an absent record is still a 204.
    db.delete_by_id(id).map_err(|e| db_err(&e.to_string()))?;
    Ok(Status::NoContent)
}

// ─── Catchers ───

#[catch(404)]
pub fn not_found() -> Json<ApiError> {
    Json(ApiError { error: "Not found".to_string(), code: "NOT_FOUND".to_string() })
}

#[catch(422)]
pub fn unprocessable_entity() -> Json<ApiError> {
    Json(ApiError { error: "Unprocessable entity".to_string(), code: "VALIDATION_ERROR".to_string() })
}

#[catch(500)]
pub fn internal_error() -> Json<ApiError> {
    Json(ApiError { error: "Internal server error".to_string(), code: "INTERNAL_ERROR".to_string() })
}
