// ==========================================
// Coffee ETL - rule constants
// ==========================================

/// Customer ids that only ever appear in test fixtures.
pub const PLACEHOLDER_IDS: [i64; 3] = [0, 123, 999];

/// Customer ids must fit a 32-bit INT column downstream.
pub const MAX_CUSTOMER_ID: i64 = 2_147_483_647;

pub const PLACEHOLDER_PHONES: [&str; 6] = [
    "0000000000",
    "000000000",
    "1111111111",
    "111111111",
    "123456789",
    "1234567890",
];

pub const VALID_CITIES: [&str; 6] = [
    "Đà Nẵng",
    "Hà Nội",
    "Hồ Chí Minh",
    "Huế",
    "Cần Thơ",
    "Hải Phòng",
];

pub const ORDER_STATUSES: [&str; 10] = [
    "Đang xử lý",
    "Hoàn thành",
    "Đã hủy",
    "Chờ xác nhận",
    "Đang giao",
    "Đã giao",
    "NEW",
    "CONFIRMED",
    "DONE",
    "CANCELLED",
];

// ===== free text =====
pub const PERSON_NAME_MIN: usize = 2;
pub const PERSON_NAME_MAX: usize = 50;
pub const PRODUCT_NAME_MIN: usize = 2;
pub const PRODUCT_NAME_MAX: usize = 200;
pub const CATEGORY_NAME_MIN: usize = 2;
pub const CATEGORY_NAME_MAX: usize = 100;
pub const INGREDIENT_NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
pub const UNIT_MIN: usize = 1;
pub const UNIT_MAX: usize = 50;
pub const SUPPLIER_MIN: usize = 2;
pub const SUPPLIER_MAX: usize = 200;
pub const REPEATED_CHAR_RUN: usize = 3;

// ===== numeric =====
pub const MAX_PRICE: f64 = 10_000_000.0;
pub const MAX_CATEGORY_ID: i64 = 1000;
pub const MAX_ORDER_QUANTITY: i64 = 1000;

// ===== temporal =====
pub const MIN_ORDER_YEAR: i32 = 2000;

/// Fields whose accepted values are tracked for duplicate detection.
///
/// All of them feed one set per entity, so an `id` and a `ma_loai`
/// with the same number collide.
pub const IDENTIFIER_FIELDS: [&str; 4] = ["id", "customer_id", "ma_nguyen_lieu", "ma_loai"];
