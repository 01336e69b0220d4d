mod app_router;
pub mod email;

pub use app_router::AppRouter;
