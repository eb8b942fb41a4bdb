// Diesel table definitions, kept in sync with the DDL in
// `repository::init_schema`.

diesel::table! {
    conversations (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    messages (id) {
        id -> Text,
        conversation_id -> Text,
        role -> Text,
        content -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    images (id) {
        id -> Text,
        conversation_id -> Text,
        filename -> Text,
        file_path -> Text,
        content_hash -> Text,
        mime_type -> Text,
        file_size -> BigInt,
        status -> Text,
        created_at -> Text,
    }
}

diesel::joinable!(messages -> conversations (conversation_id));
diesel::joinable!(images -> conversations (conversation_id));

diesel::allow_tables_to_appear_in_same_query!(conversations, messages, images);
