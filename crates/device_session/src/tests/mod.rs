mod codec_tests;
mod supervisor_tests;
mod support;
