mod load_remove_test;
mod persistence_test;
