mod find_test;
mod plan_test;
mod update_test;
