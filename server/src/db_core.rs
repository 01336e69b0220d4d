pub mod prelude {
    pub use entity::prelude::*;
    pub use entity::{conversation, email, user_reply};

    pub use sea_orm::{
        prelude::DateTimeWithTimeZone,
        sea_query::OnConflict,
        ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
        Order, QueryFilter, QueryOrder,
    };
}
