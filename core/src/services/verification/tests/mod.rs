mod supervisor_tests;
