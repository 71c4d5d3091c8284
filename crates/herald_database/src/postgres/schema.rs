// Mirrors the SQL under migrations/.

diesel::table! {
    content_items (id) {
        id -> Uuid,
        text -> Text,
        image_url -> Nullable<Text>,
        image_alt_text -> Nullable<Text>,
        source_trend -> Nullable<Text>,
        status -> Text,
        platform_post_id -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        thread_id -> Nullable<Uuid>,
        thread_position -> Int4,
        claimed_by -> Nullable<Uuid>,
        claimed_until -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    post_attempts (id) {
        id -> Uuid,
        content_item_id -> Uuid,
        attempt_number -> Int4,
        attempted_at -> Timestamptz,
        outcome -> Text,
        platform_response_id -> Nullable<Text>,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    cycle_records (id) {
        id -> Uuid,
        started_at -> Timestamptz,
        finished_at -> Timestamptz,
        outcome -> Text,
        content_item_id -> Nullable<Uuid>,
        dependency -> Nullable<Text>,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    dependency_states (dependency) {
        dependency -> Text,
        window_start -> Timestamptz,
        window_ms -> Int8,
        max_calls -> Int4,
        calls_used -> Int4,
        circuit_phase -> Text,
        consecutive_failures -> Int4,
        cooldown_until -> Nullable<Timestamptz>,
        current_cooldown_ms -> Int8,
        version -> Int8,
    }
}

diesel::table! {
    engagement_snapshots (content_item_id) {
        content_item_id -> Uuid,
        post_id -> Text,
        impressions -> Int8,
        likes -> Int8,
        reposts -> Int8,
        replies -> Int8,
        fetched_at -> Timestamptz,
    }
}

diesel::joinable!(post_attempts -> content_items (content_item_id));
diesel::joinable!(engagement_snapshots -> content_items (content_item_id));

diesel::allow_tables_to_appear_in_same_query!(
    content_items,
    post_attempts,
    cycle_records,
    dependency_states,
    engagement_snapshots,
);
