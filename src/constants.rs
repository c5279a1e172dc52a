pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const USER_COUNT_PER_PAGE: i64 = 10;

/// How many of an author's recipes a subscription entry carries when the
/// client doesn't ask for a specific `recipes_limit`.
pub const DEFAULT_RECIPES_LIMIT: i64 = 3;

pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MAX_INGREDIENT_AMOUNT: i32 = 32767;

pub const MIN_COOKING_TIME: i32 = 1;

pub const SESSION_COOKIE: &str = "session";
