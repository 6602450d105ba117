//! Operation documents sent to the parking service

pub const GET_MONITOR_DATA: &str = r#"
query GetMonitorData {
  activeVehicles {
    id
    session_id
    driver_phone
    vehicle_type
    vehicle_number
    entry_time
    status
    base_fee_paid
    duration_minutes
    is_overstay
    overstay_minutes
    declared_duration_hours
  }
  pricingRules {
    id
    vehicle_type
    base_fee
    base_hours
    extra_hour_rate
  }
}
"#;

pub const GET_PRICING_RULES: &str = r#"
query GetPricingRules {
  pricingRules {
    id
    vehicle_type
    base_fee
    base_hours
    extra_hour_rate
  }
}
"#;

pub const GET_STATS_DATA: &str = r#"
query GetStatsData {
  dashboardStats {
    active_vehicles
    completed_today
    base_fees_collected
    overstay_fees_collected
    total_revenue_today
  }
  activeVehicles {
    id
    vehicle_type
    is_overstay
  }
}
"#;

pub const LOG_ENTRY: &str = r#"
mutation LogEntry($input: VehicleEntryInput!) {
  logVehicleEntry(input: $input) {
    id
    session_id
    base_fee_paid
    vehicle_number
  }
}
"#;

pub const PROCESS_EXIT: &str = r#"
mutation ProcessExit($sessionId: String!) {
  processVehicleExit(session_id: $sessionId) {
    session_id
    total_amount
    overstay_fee
    overstay_record {
      id
      fee_amount
    }
  }
}
"#;

pub const COLLECT_PAYMENT: &str = r#"
mutation CollectPayment($chargeId: ID!) {
  collectOverstayPayment(overstay_charge_id: $chargeId) {
    id
    is_collected
  }
}
"#;

pub const TRANSACTION_HISTORY: &str = r#"
query TransactionHistory(
  $page: Int
  $page_size: Int
  $status: String
  $vehicle_type: String
  $start_date: String
  $end_date: String
  $search: String
) {
  transactionHistory(
    page: $page
    page_size: $page_size
    status: $status
    vehicle_type: $vehicle_type
    start_date: $start_date
    end_date: $end_date
    search: $search
  ) {
    records {
      id
      session_id
      vehicle_number
      vehicle_type
      driver_phone
      entry_time
      exit_time
      status
      base_fee_paid
      overstay_fee
      total_amount
    }
    total_count
  }
}
"#;
