pub const BUILD_NUMBER: &str = "106d4e59-bbcc-446d-9df2-ecd5f08a2b70";
