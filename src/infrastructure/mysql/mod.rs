pub mod mysql_session;
