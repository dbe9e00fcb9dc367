// SQL query constants for repositories

/// Schedules joined with their data element, dataset and server
pub mod schedule_queries {
    pub const SELECT_JOINED: &str = r#"
        SELECT
            s.id AS schedule_id, s.period_enumerator, s.time_offset_minutes,
            sv.id AS server_id, sv.name AS server_name, sv.url AS server_url,
            sv.username AS server_username, sv.password AS server_password,
            d.id AS dataset_id, d.name AS dataset_name, d.dhis_dataset_id,
            d.period AS dataset_period, d.time_offset_minutes AS dataset_time_offset_minutes,
            de.id AS data_element_id, de.name AS data_element_name, de.source,
            de.indicator, de.code, de.category_option_combo
        FROM schedules s
        JOIN data_elements de ON de.id = s.data_element_id
        JOIN datasets d ON d.id = de.dataset_id
        JOIN servers sv ON sv.id = d.server_id
    "#;
}

/// SQL query fragments for the period_mappings table
pub mod period_mapping_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, name, source, dhis_period, processing_period_id, start_date, end_date";
}
