mod fragments_test;
