#[macro_use]
extern crate rocket;

pub mod db;
pub mod routes;
pub mod store;

use store::{PostRepository, SqliteRepository};

pub type Repo = Box<dyn PostRepository>;

pub fn create_rocket(conn: rusqlite::Connection) -> rocket::Rocket<rocket::Build> {
    let cors = rocket_cors::CorsOptions::default()
        .allowed_origins(rocket_cors::AllowedOrigins::all())
        .to_cors()
        .expect("CORS config");

    let repo: Repo = Box::new(SqliteRepository::new(conn));

    rocket::build()
        .manage(repo)
        .attach(cors)
        .mount("/", routes![
            routes::health,
            routes::list_posts,
            routes::create_post,
            routes::update_post,
            routes::delete_post,
        ])
        .register("/", catchers![routes::not_found, routes::unprocessable_entity, routes::internal_error])
}
