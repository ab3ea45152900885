mod collection_test;
mod document_test;
mod index_test;
